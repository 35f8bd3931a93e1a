//! File enumeration
//!
//! Turns a root directory plus a list of input paths into the flat, sorted
//! list of regular files a torrent describes.

use crate::error::{Result, TorrentError};
use crate::hash::queue::{Capacity, Limiter, Ticket};
use std::path::{Component, Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, info, trace};

/// A regular file, relative to the torrent's root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path segments below the root
    pub path: Vec<String>,
    /// Length in bytes
    pub length: u64,
}

impl FileEntry {
    /// Create a new entry
    pub fn new(path: Vec<String>, length: u64) -> Self {
        Self { path, length }
    }

    /// Segments joined with `/`
    pub fn joined(&self) -> String {
        self.path.join("/")
    }

    /// Absolute location of the file below `dir`
    pub fn full_path(&self, dir: &Path) -> PathBuf {
        self.path.iter().fold(dir.to_path_buf(), |acc, segment| acc.join(segment))
    }

    /// Reject entries that could escape the root directory
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(TorrentError::validation_error_with_field(
                "File path must name a file inside the root directory",
                "path",
            ));
        }
        for segment in &self.path {
            let unsafe_segment = segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('/')
                || segment.contains('\\')
                || segment.contains('\0');
            if unsafe_segment {
                return Err(TorrentError::validation_error_with_field(
                    format!("Unsafe path segment {:?} in {:?}", segment, self.path),
                    "path",
                ));
            }
        }
        Ok(())
    }
}

/// Where the hasher gets its file list from
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Input paths relative to the root; directories are walked
    Paths(Vec<String>),
    /// A ready file list, used as-is and in the given order
    Entries(Vec<FileEntry>),
}

impl FileSource {
    /// Resolve into the concrete entry list
    pub async fn resolve(self, dir: &Path, max_open_files: usize) -> Result<Vec<FileEntry>> {
        match self {
            FileSource::Paths(inputs) => enumerate(dir, &inputs, max_open_files).await,
            FileSource::Entries(entries) => Ok(entries),
        }
    }
}

enum Visit {
    File(FileEntry),
    Dir(Vec<Vec<String>>),
    Skipped,
}

/// Enumerate every regular file reachable from `inputs` below `dir`.
///
/// Stats and directory reads run concurrently, at most `max_open_files` at
/// a time. The result is sorted by the comma-joined segment list, the order
/// existing torrents were built with.
pub async fn enumerate(dir: &Path, inputs: &[String], max_open_files: usize) -> Result<Vec<FileEntry>> {
    info!("Enumerating {} input path(s) below {}", inputs.len(), dir.display());

    let mut limiter = Limiter::new(Capacity::tasks(max_open_files));
    for input in inputs {
        limiter.push(relative_segments(input)?, 0);
    }

    let mut running: JoinSet<(Ticket, Result<Visit>)> = JoinSet::new();
    let mut entries = Vec::new();

    loop {
        while let Some((segments, ticket)) = limiter.admit() {
            let full = join_segments(dir, &segments);
            running.spawn(async move { (ticket, visit(full, segments).await) });
        }

        let Some(joined) = running.join_next().await else {
            break;
        };
        let (ticket, visited) =
            joined.map_err(|e| TorrentError::io_error(format!("File enumeration task failed: {}", e)))?;

        match visited? {
            Visit::File(entry) => entries.push(entry),
            Visit::Dir(children) => {
                for child in children {
                    limiter.push(child, 0);
                }
            }
            Visit::Skipped => {}
        }
        // Children are queued first, so only the last visit drains
        if limiter.finish(ticket) {
            break;
        }
    }

    entries.sort_by_cached_key(|entry| entry.path.join(","));
    debug!("Enumerated {} file(s)", entries.len());
    Ok(entries)
}

async fn visit(full: PathBuf, segments: Vec<String>) -> Result<Visit> {
    let metadata = tokio::fs::metadata(&full)
        .await
        .map_err(|e| TorrentError::from_io(format!("{} does not exist", full.display()), &full, &e))?;

    if metadata.is_file() {
        let entry = FileEntry::new(segments, metadata.len());
        entry.validate()?;
        trace!("Found file {} ({} bytes)", full.display(), entry.length);
        return Ok(Visit::File(entry));
    }

    if metadata.is_dir() {
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| TorrentError::from_io("Failed to read directory", &full, &e))?;
        let mut children = Vec::new();
        while let Some(child) = reader
            .next_entry()
            .await
            .map_err(|e| TorrentError::from_io("Failed to read directory entry", &full, &e))?
        {
            let name = child.file_name().into_string().map_err(|raw| {
                TorrentError::validation_error_with_field(
                    format!("File name is not valid UTF-8: {:?}", raw),
                    "path",
                )
            })?;
            let mut path = segments.clone();
            path.push(name);
            children.push(path);
        }
        return Ok(Visit::Dir(children));
    }

    debug!("Skipping {}: not a regular file or directory", full.display());
    Ok(Visit::Skipped)
}

/// Split an input path into segments, dropping `.` and rejecting anything
/// that leaves the root.
fn relative_segments(input: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    for component in Path::new(input).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    TorrentError::validation_error_with_field(
                        format!("Input path is not valid UTF-8: {:?}", input),
                        "files",
                    )
                })?;
                segments.push(part.to_string());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(TorrentError::validation_error_with_field(
                    format!("Input path may not contain `..`: {}", input),
                    "files",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(TorrentError::validation_error_with_field(
                    format!("Input path must be relative to the root directory: {}", input),
                    "files",
                ));
            }
        }
    }
    Ok(segments)
}

fn join_segments(dir: &Path, segments: &[String]) -> PathBuf {
    segments.iter().fold(dir.to_path_buf(), |acc, segment| acc.join(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, len: usize) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![7u8; len]).unwrap();
    }

    fn paths(entries: &[FileEntry]) -> Vec<String> {
        entries.iter().map(FileEntry::joined).collect()
    }

    #[tokio::test]
    async fn test_enumerate_walks_directories() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b.txt", 3);
        write(tmp.path(), "a/one.bin", 10);
        write(tmp.path(), "a/deep/two.bin", 0);

        let entries = enumerate(tmp.path(), &[".".to_string()], 2).await.unwrap();
        assert_eq!(paths(&entries), vec!["a/deep/two.bin", "a/one.bin", "b.txt"]);
        assert_eq!(entries[1].length, 10);
        assert_eq!(entries[0].length, 0);
    }

    #[tokio::test]
    async fn test_directory_chain_with_one_slot() {
        // every visit but the last is a directory whose children are still to come
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/b/c/d/leaf.bin", 5);
        std::fs::create_dir_all(tmp.path().join("a/b/empty")).unwrap();

        let entries = enumerate(tmp.path(), &["a".to_string()], 1).await.unwrap();
        assert_eq!(paths(&entries), vec!["a/b/c/d/leaf.bin"]);
    }

    #[tokio::test]
    async fn test_sort_uses_comma_joined_segments() {
        // "a,b" < "a-b" because ',' (0x2c) sorts before '-' (0x2d)
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a-b", 1);
        write(tmp.path(), "a/b", 1);

        let entries = enumerate(tmp.path(), &["a-b".to_string(), "a".to_string()], 4)
            .await
            .unwrap();
        assert_eq!(paths(&entries), vec!["a/b", "a-b"]);
    }

    #[tokio::test]
    async fn test_single_file_input() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "sub/file.dat", 42);

        let entries = enumerate(tmp.path(), &["./sub/file.dat".to_string()], 1).await.unwrap();
        assert_eq!(entries, vec![FileEntry::new(vec!["sub".into(), "file.dat".into()], 42)]);
    }

    #[tokio::test]
    async fn test_missing_path_is_io_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "present", 1);

        let err = enumerate(tmp.path(), &["present".to_string(), "absent".to_string()], 4)
            .await
            .unwrap_err();
        assert!(matches!(err, TorrentError::IoError { .. }));
        assert!(err.to_string().contains("absent"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_inputs() {
        let tmp = TempDir::new().unwrap();
        let err = enumerate(tmp.path(), &["../etc".to_string()], 4).await.unwrap_err();
        assert!(matches!(err, TorrentError::ValidationError { .. }));

        let err = enumerate(tmp.path(), &["/etc/passwd".to_string()], 4).await.unwrap_err();
        assert!(matches!(err, TorrentError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn test_entries_source_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let entries = vec![
            FileEntry::new(vec!["z".into()], 1),
            FileEntry::new(vec!["a".into()], 2),
        ];
        let resolved = FileSource::Entries(entries.clone()).resolve(tmp.path(), 4).await.unwrap();
        assert_eq!(resolved, entries);
    }

    #[test]
    fn test_validate_entry() {
        assert!(FileEntry::new(vec!["ok".into(), "file".into()], 1).validate().is_ok());
        assert!(FileEntry::new(vec![], 1).validate().is_err());
        assert!(FileEntry::new(vec!["..".into()], 1).validate().is_err());
        assert!(FileEntry::new(vec!["a/b".into()], 1).validate().is_err());
        assert!(FileEntry::new(vec!["".into()], 1).validate().is_err());
    }

    #[test]
    fn test_full_path() {
        let entry = FileEntry::new(vec!["a".into(), "b.txt".into()], 1);
        assert_eq!(entry.full_path(Path::new("/root")), PathBuf::from("/root/a/b.txt"));
        assert_eq!(entry.joined(), "a/b.txt");
    }
}
