//! Piece buffers
//!
//! One accumulation buffer per piece. A buffer is allocated on its first
//! write and released as soon as the piece is complete and hashed, so
//! memory tracks the pieces currently in flight rather than the torrent.

use crate::error::{Result, TorrentError};
use crate::hash::layout::PieceLayout;
use sha1::{Digest, Sha1};
use std::sync::Mutex;
use tracing::trace;

/// SHA-1 of `data`
pub fn sha1_digest(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Accumulation state of one piece
#[derive(Debug, Default)]
pub struct PieceBuffer {
    length: usize,
    bytes: Option<Vec<u8>>,
    written: usize,
    hashed: bool,
}

impl PieceBuffer {
    /// Create an unallocated buffer for a piece of `length` bytes
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    /// Copy as much of `data` as fits at `offset`. Returns the number of
    /// bytes taken.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        if self.hashed {
            return Err(TorrentError::state_error("Write to a piece that was already hashed"));
        }
        if offset >= self.length {
            return Err(TorrentError::state_error(format!(
                "Write at offset {} past piece end {}",
                offset, self.length
            )));
        }
        let taken = data.len().min(self.length - offset);
        if self.written + taken > self.length {
            return Err(TorrentError::state_error("Piece received more bytes than its length"));
        }

        let length = self.length;
        let bytes = self.bytes.get_or_insert_with(|| vec![0u8; length]);
        bytes[offset..offset + taken].copy_from_slice(&data[..taken]);
        self.written += taken;
        Ok(taken)
    }

    /// Every byte of the piece has been written
    pub fn is_complete(&self) -> bool {
        self.written == self.length
    }

    pub fn is_allocated(&self) -> bool {
        self.bytes.is_some()
    }

    /// Take the bytes out of a complete piece, releasing the buffer
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if !self.is_complete() || self.hashed {
            return None;
        }
        self.hashed = true;
        Some(self.bytes.take().unwrap_or_default())
    }
}

/// All piece buffers of a layout, each behind its own lock
#[derive(Debug)]
pub struct PieceTable {
    slots: Vec<Mutex<PieceBuffer>>,
}

impl PieceTable {
    /// Create unallocated buffers for every piece of `layout`
    pub fn new(layout: &PieceLayout) -> Result<Self> {
        let slots = (0..layout.piece_count)
            .map(|index| {
                let len = layout.piece_len(index).unwrap_or(0);
                usize::try_from(len)
                    .map(|len| Mutex::new(PieceBuffer::new(len)))
                    .map_err(|_| TorrentError::validation_error_with_field("Piece length too large", "piece_length"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slots })
    }

    /// Write `data` into piece `index` at `offset`.
    ///
    /// Returns how many bytes the piece took and, when this write completed
    /// it, the piece digest. Hashing happens outside the lock.
    pub fn write(&self, index: u32, offset: u64, data: &[u8]) -> Result<(usize, Option<[u8; 20]>)> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or_else(|| TorrentError::state_error(format!("Piece index {} out of range", index)))?;
        let offset = usize::try_from(offset).map_err(|_| TorrentError::state_error("Piece offset too large"))?;

        let (taken, complete) = {
            let mut buffer = slot
                .lock()
                .map_err(|_| TorrentError::state_error(format!("Piece {} buffer lock poisoned", index)))?;
            let taken = buffer.write(offset, data)?;
            (taken, buffer.take())
        };

        if taken == 0 {
            return Err(TorrentError::state_error(format!("Piece {} accepted no bytes", index)));
        }

        let digest = complete.map(|bytes| {
            trace!("Piece {} complete ({} bytes)", index, bytes.len());
            sha1_digest(&bytes)
        });
        Ok((taken, digest))
    }

    /// Number of buffers currently holding memory
    pub fn allocated(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.lock().map(|buffer| buffer.is_allocated()).unwrap_or(false))
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
