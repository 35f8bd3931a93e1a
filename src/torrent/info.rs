//! Torrent information structures
//!
//! Typed, validated view of a metainfo file.

use crate::error::{Result, TorrentError};
use crate::hash::FileEntry;
use serde::Serialize;
use sha1::{Digest, Sha1};

/// A file entry of the `info` dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentFile {
    /// File path components (e.g., ["folder", "subfolder", "file.txt"])
    pub path: Vec<String>,
    /// File size in bytes
    pub length: u64,
    /// Optional hex MD5 of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5sum: Option<String>,
}

impl TorrentFile {
    pub fn new(path: Vec<String>, length: u64) -> Self {
        Self {
            path,
            length,
            md5sum: None,
        }
    }
}

impl From<&TorrentFile> for FileEntry {
    fn from(file: &TorrentFile) -> Self {
        FileEntry::new(file.path.clone(), file.length)
    }
}

/// High-level torrent information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentInfo {
    /// Primary tracker announce URL
    pub announce: String,
    /// Tiers of backup trackers
    pub announce_list: Vec<Vec<String>>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    /// Seconds since the unix epoch
    pub creation_date: Option<i64>,
    /// Web seeds
    pub url_list: Vec<String>,
    /// SHA1 hash of the bencoded info dictionary
    pub info_hash: [u8; 20],
    /// Size of each piece in bytes
    pub piece_length: u64,
    /// List of piece hashes (each is a 20-byte SHA1 hash)
    pub pieces: Vec<[u8; 20]>,
    /// Torrent name
    pub name: String,
    pub private: bool,
    pub source: Option<String>,
    /// Single file size (None for multi-file torrents)
    pub length: Option<u64>,
    pub md5sum: Option<String>,
    /// Files in multi-file torrents (None for single-file torrents)
    pub files: Option<Vec<TorrentFile>>,
}

impl TorrentInfo {
    /// Calculate total size of all files in torrent
    pub fn total_size(&self) -> u64 {
        match (&self.files, self.length) {
            (Some(files), _) => files.iter().map(|f| f.length).sum(),
            (None, Some(length)) => length,
            (None, None) => 0,
        }
    }

    /// Get number of pieces in torrent
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// All files of the torrent; a single-file torrent yields one file
    /// named after the torrent, split on `/`
    pub fn files_iter(&self) -> impl Iterator<Item = TorrentFile> + '_ {
        let single = match (&self.files, self.length) {
            (None, Some(length)) => Some(TorrentFile {
                path: self
                    .name
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect(),
                length,
                md5sum: self.md5sum.clone(),
            }),
            _ => None,
        };
        self.files.iter().flatten().cloned().chain(single)
    }

    /// The file list the hasher reads when checking this torrent
    pub fn file_entries(&self) -> Vec<FileEntry> {
        self.files_iter().map(|file| FileEntry::from(&file)).collect()
    }

    /// Check if this is a multi-file torrent
    pub fn is_multi_file(&self) -> bool {
        self.files.is_some()
    }

    /// Every tracker URL: `announce` first, then the announce-list tiers,
    /// without duplicates
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers: Vec<String> = Vec::new();
        let tiers = self.announce_list.iter().flatten();
        for url in std::iter::once(&self.announce).chain(tiers) {
            if !url.is_empty() && !trackers.contains(url) {
                trackers.push(url.clone());
            }
        }
        trackers
    }

    /// Get info hash as a hex string
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }

    /// Generate info hash from info dictionary bytes
    pub fn generate_info_hash(info_dict_bytes: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        hasher.finalize().into()
    }

    /// Parse piece hashes from concatenated bytes in torrent file
    pub fn parse_piece_hashes(pieces_bytes: &[u8]) -> Result<Vec<[u8; 20]>> {
        if pieces_bytes.len() % 20 != 0 {
            return Err(TorrentError::schema_error("`info.pieces` length is not divisible by 20"));
        }

        Ok(pieces_bytes
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> TorrentInfo {
        TorrentInfo {
            announce: "http://tracker.example.com".to_string(),
            piece_length: 1024,
            pieces: vec![[2u8; 20], [3u8; 20]],
            name: "single.txt".to_string(),
            length: Some(1500),
            ..Default::default()
        }
    }

    fn multi() -> TorrentInfo {
        TorrentInfo {
            announce: "http://tracker.example.com".to_string(),
            piece_length: 1024,
            pieces: vec![[2u8; 20]],
            name: "multi".to_string(),
            files: Some(vec![
                TorrentFile::new(vec!["file1.txt".to_string()], 500),
                TorrentFile::new(vec!["dir".to_string(), "file2.txt".to_string()], 524),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_file_view() {
        let info = single();
        assert_eq!(info.total_size(), 1500);
        assert_eq!(info.piece_count(), 2);
        assert!(!info.is_multi_file());

        let files: Vec<_> = info.files_iter().collect();
        assert_eq!(files, vec![TorrentFile::new(vec!["single.txt".to_string()], 1500)]);
    }

    #[test]
    fn test_multi_file_view() {
        let info = multi();
        assert_eq!(info.total_size(), 1024);
        assert!(info.is_multi_file());
        let entries = info.file_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].joined(), "dir/file2.txt");
    }

    #[test]
    fn test_trackers_deduplicated() {
        let mut info = single();
        info.announce_list = vec![
            vec!["http://tracker.example.com".to_string()],
            vec!["udp://backup:80".to_string(), "udp://other:80".to_string()],
        ];
        assert_eq!(
            info.trackers(),
            vec!["http://tracker.example.com", "udp://backup:80", "udp://other:80"]
        );
    }

    #[test]
    fn test_generate_info_hash() {
        let hash = TorrentInfo::generate_info_hash(b"abc");
        assert_eq!(hex::encode(hash), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_parse_piece_hashes() {
        let hashes: Vec<u8> = (0..40).map(|i| i as u8).collect();
        let result = TorrentInfo::parse_piece_hashes(&hashes).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1][0], 20);

        let err = TorrentInfo::parse_piece_hashes(&[1u8; 21]).unwrap_err();
        assert!(matches!(err, TorrentError::SchemaError { .. }));
    }
}
