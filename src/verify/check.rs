//! Piece verification
//!
//! Drives a [`Hasher`] over the file list a metainfo records and compares
//! each digest with the recorded one. A mismatch never stops the run, so a
//! partially downloaded directory is reported piece by piece.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TorrentError};
use crate::hash::{
    round_percent, FileSource, HashEvent, HashOptions, Hasher, HasherControl, PieceLayout, Progress,
    DEFAULT_CHUNK_SIZE, MAX_FILES_OPENED,
};
use crate::torrent::Metainfo;

/// Resource limits for a check
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub max_open_files: usize,
    pub max_memory: Option<u64>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            max_open_files: MAX_FILES_OPENED,
            max_memory: None,
        }
    }
}

/// Outcome of comparing one piece
#[derive(Debug, Clone, PartialEq)]
pub struct PieceCheck {
    pub index: u32,
    pub matched: bool,
    /// Matched pieces so far over all pieces, two decimals
    pub percent_matched: f64,
    /// Compared pieces so far over all pieces, two decimals
    pub percent_checked: f64,
    pub file: PathBuf,
}

/// What a running check reports
#[derive(Debug, Clone, Copy)]
pub enum CheckEvent<'a> {
    Piece(&'a PieceCheck),
    Progress(&'a Progress),
}

/// Summary of a finished check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub pieces: u32,
    pub matched: u32,
    /// Indices that did not match, ascending
    pub mismatched: Vec<u32>,
}

impl CheckReport {
    /// Every piece matched
    pub fn is_complete(&self) -> bool {
        self.matched == self.pieces
    }

    pub fn percent(&self) -> f64 {
        round_percent(self.matched as u64, self.pieces as u64)
    }
}

/// A hash check of one metainfo against one directory
#[derive(Debug)]
pub struct HashCheck {
    hasher: Hasher,
    expected: Vec<[u8; 20]>,
}

impl HashCheck {
    pub async fn new(metainfo: &Metainfo, dir: impl AsRef<Path>, options: CheckOptions) -> Result<Self> {
        let info = metainfo.info();
        let hash_options = HashOptions {
            max_open_files: options.max_open_files,
            max_memory: options.max_memory,
            stop_on_first_error: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        };
        let hasher = Hasher::new(
            dir,
            FileSource::Entries(info.file_entries()),
            info.piece_length,
            hash_options,
        )
        .await?;

        let pieces = hasher.layout().piece_count as usize;
        if pieces != info.pieces.len() {
            return Err(TorrentError::schema_error(format!(
                "Torrent records {} piece hashes but its files span {} pieces",
                info.pieces.len(),
                pieces
            )));
        }
        debug!("Checking {} pieces of {}", pieces, info.name);

        Ok(Self {
            hasher,
            expected: info.pieces.clone(),
        })
    }

    pub fn control(&self) -> HasherControl {
        self.hasher.control()
    }

    pub fn layout(&self) -> &PieceLayout {
        self.hasher.layout()
    }

    /// Compare every piece, calling `on_check` as results arrive
    pub async fn run(self, mut on_check: impl FnMut(&PieceCheck) + Send) -> Result<CheckReport> {
        self.run_with_events(|event| {
            if let CheckEvent::Piece(check) = event {
                on_check(check);
            }
        })
        .await
    }

    /// [`run`](Self::run) that also reports read progress
    pub async fn run_with_events(mut self, mut on_event: impl FnMut(CheckEvent<'_>) + Send) -> Result<CheckReport> {
        let pieces = self.hasher.layout().piece_count;
        let mut events = self.hasher.start()?;
        let mut report = CheckReport {
            pieces,
            ..Default::default()
        };
        let mut checked = 0u32;

        loop {
            match events.recv().await {
                Some(HashEvent::Hash(result)) => {
                    checked += 1;
                    // a digest the torrent does not record counts as a mismatch
                    let matched = self.expected.get(result.index as usize) == Some(&result.digest);
                    if matched {
                        report.matched += 1;
                    } else {
                        debug!("Piece {} does not match ({})", result.index, result.file.display());
                        report.mismatched.push(result.index);
                    }
                    on_event(CheckEvent::Piece(&PieceCheck {
                        index: result.index,
                        matched,
                        percent_matched: round_percent(report.matched as u64, pieces as u64),
                        percent_checked: round_percent(checked as u64, pieces as u64),
                        file: result.file,
                    }));
                }
                Some(HashEvent::Progress(progress)) => on_event(CheckEvent::Progress(&progress)),
                Some(HashEvent::Open(_)) => {}
                Some(HashEvent::Error(e)) => {
                    self.hasher.destroy();
                    return Err(e);
                }
                Some(HashEvent::End) => break,
                None => {
                    return Err(TorrentError::state_error_with_state(
                        "Hash check stopped before completion",
                        self.hasher.state(),
                    ))
                }
            }
        }

        report.mismatched.sort_unstable();
        info!(
            "Hash check finished: {}/{} pieces match ({}%)",
            report.matched,
            report.pieces,
            report.percent()
        );
        Ok(report)
    }
}
