//! Piece layout
//!
//! Maps the concatenated byte stream of an ordered file list onto
//! fixed-size pieces. Pure arithmetic, no I/O.

use crate::error::{Result, TorrentError};
use crate::hash::files::FileEntry;

/// A file together with the position its first byte lands on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    pub file: FileEntry,
    /// Piece holding the file's first byte
    pub start_piece: u32,
    /// Offset of the first byte within `start_piece`
    pub start_offset: u64,
}

impl FileTask {
    /// Number of pieces this file touches (zero for an empty file)
    pub fn pieces_spanned(&self, piece_length: u64) -> u64 {
        if self.file.length == 0 {
            return 0;
        }
        (self.start_offset + self.file.length - 1) / piece_length + 1
    }

    /// Split the file into per-piece segments
    pub fn segments(&self, piece_length: u64) -> Segments {
        Segments {
            piece_length,
            start_piece: self.start_piece,
            position: self.start_offset,
            file_offset: 0,
            remaining: self.file.length,
        }
    }
}

/// The part of a file that falls inside one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub piece: u32,
    pub piece_offset: u64,
    pub file_offset: u64,
    pub len: u64,
}

/// Iterator over a file's [`Segment`]s
#[derive(Debug, Clone)]
pub struct Segments {
    piece_length: u64,
    start_piece: u32,
    position: u64,
    file_offset: u64,
    remaining: u64,
}

impl Iterator for Segments {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.remaining == 0 {
            return None;
        }
        let piece_offset = self.position % self.piece_length;
        let len = self.remaining.min(self.piece_length - piece_offset);
        let segment = Segment {
            piece: self.start_piece + (self.position / self.piece_length) as u32,
            piece_offset,
            file_offset: self.file_offset,
            len,
        };
        self.position += len;
        self.file_offset += len;
        self.remaining -= len;
        Some(segment)
    }
}

/// Where every file lands in the piece sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceLayout {
    pub piece_length: u64,
    pub total_size: u64,
    pub piece_count: u32,
    pub last_piece_length: u64,
    pub tasks: Vec<FileTask>,
}

impl PieceLayout {
    /// Length of piece `index`, `None` when out of range
    pub fn piece_len(&self, index: u32) -> Option<u64> {
        if index >= self.piece_count {
            None
        } else if index + 1 == self.piece_count {
            Some(self.last_piece_length)
        } else {
            Some(self.piece_length)
        }
    }

    /// Files in layout order
    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.tasks.iter().map(|task| &task.file)
    }
}

/// Compute the layout of `files` for `piece_length` byte pieces
pub fn map_pieces(files: &[FileEntry], piece_length: u64) -> Result<PieceLayout> {
    if piece_length == 0 {
        return Err(TorrentError::validation_error_with_field(
            "Piece length must be positive",
            "piece_length",
        ));
    }

    let mut tasks = Vec::with_capacity(files.len());
    let mut total: u64 = 0;
    for file in files {
        let start_piece = u32::try_from(total / piece_length).map_err(|_| too_many_pieces())?;
        tasks.push(FileTask {
            file: file.clone(),
            start_piece,
            start_offset: total % piece_length,
        });
        total = total.checked_add(file.length).ok_or_else(|| {
            TorrentError::validation_error_with_field("Total size overflows 64 bits", "length")
        })?;
    }

    let piece_count = if total == 0 { 1 } else { total.div_ceil(piece_length) };
    let piece_count = u32::try_from(piece_count).map_err(|_| too_many_pieces())?;
    let last_piece_length = total - piece_length * (piece_count as u64 - 1);

    Ok(PieceLayout {
        piece_length,
        total_size: total,
        piece_count,
        last_piece_length,
        tasks,
    })
}

fn too_many_pieces() -> TorrentError {
    TorrentError::validation_error_with_field("Too many pieces for this piece length", "piece_length")
}
