//! Output sinks for bencoded metainfo
//!
//! The maker streams a metainfo in three parts (prefix, digests, suffix), so
//! output goes through a small async trait rather than a finished buffer.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TorrentError};

/// Destination of a streamed metainfo
#[async_trait]
pub trait MetainfoSink: Send {
    /// Append bytes
    async fn write(&mut self, data: Bytes) -> Result<()>;

    /// Every byte was written; make the output visible
    async fn commit(&mut self) -> Result<()>;

    /// Discard partial output
    async fn abort(&mut self) -> Result<()>;

    /// Bytes written so far
    fn bytes_written(&self) -> u64;
}

/// Collects the output in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: BytesMut,
    committed: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// The collected bytes
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

#[async_trait]
impl MetainfoSink for MemorySink {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        self.buf.extend_from_slice(&data);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.committed = true;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.buf.clear();
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buf.len() as u64
    }
}

/// `<output>.tmp` for `output`
pub fn temp_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Writes to `<output>.tmp` and renames it over `output` on commit, so a
/// reader never sees a half-written torrent
#[derive(Debug)]
pub struct FileSink {
    output: PathBuf,
    tmp: PathBuf,
    file: Option<BufWriter<File>>,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) the temporary file
    pub async fn create(output: impl Into<PathBuf>) -> Result<Self> {
        let output = output.into();
        let tmp = temp_path(&output);

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create directory {}: {}", parent.display(), e);
                TorrentError::from_io("Failed to create output directory", parent, &e)
            })?;
        }

        let file = File::create(&tmp).await.map_err(|e| {
            error!("Failed to create {}: {}", tmp.display(), e);
            TorrentError::from_io("Failed to create temporary output file", &tmp, &e)
        })?;
        debug!("Writing metainfo to {}", tmp.display());

        Ok(Self {
            output,
            tmp,
            file: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    /// Final location
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Temporary location written until commit
    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| TorrentError::state_error("Output file already committed or aborted"))
    }
}

#[async_trait]
impl MetainfoSink for FileSink {
    async fn write(&mut self, data: Bytes) -> Result<()> {
        let tmp = self.tmp.clone();
        self.writer()?.write_all(&data).await.map_err(|e| {
            error!("Failed to write {}: {}", tmp.display(), e);
            TorrentError::from_io("Failed to write output file", &tmp, &e)
        })?;
        self.written += data.len() as u64;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut writer = self
            .file
            .take()
            .ok_or_else(|| TorrentError::state_error("Output file already committed or aborted"))?;
        writer
            .flush()
            .await
            .map_err(|e| TorrentError::from_io("Failed to flush output file", &self.tmp, &e))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| TorrentError::from_io("Failed to sync output file", &self.tmp, &e))?;
        drop(writer);

        tokio::fs::rename(&self.tmp, &self.output).await.map_err(|e| {
            error!("Failed to move {} to {}: {}", self.tmp.display(), self.output.display(), e);
            TorrentError::from_io("Failed to move output file into place", &self.output, &e)
        })?;
        info!("Wrote {} ({} bytes)", self.output.display(), self.written);
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.file.take();
        match tokio::fs::remove_file(&self.tmp).await {
            Ok(()) => {
                debug!("Removed {}", self.tmp.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to remove {}: {}", self.tmp.display(), e);
                Err(TorrentError::from_io("Failed to remove temporary output file", &self.tmp, &e))
            }
        }
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path() {
        assert_eq!(temp_path(Path::new("out/a.torrent")), PathBuf::from("out/a.torrent.tmp"));
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write(Bytes::from_static(b"d4:")).await.unwrap();
        sink.write(Bytes::from_static(b"spame")).await.unwrap();
        sink.commit().await.unwrap();
        assert!(sink.is_committed());
        assert_eq!(sink.bytes_written(), 8);
        assert_eq!(&sink.into_bytes()[..], b"d4:spame");
    }

    #[tokio::test]
    async fn test_file_sink_commit_renames() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("nested").join("file.torrent");

        let mut sink = FileSink::create(&output).await.unwrap();
        assert!(sink.tmp_path().exists());
        sink.write(Bytes::from_static(b"le")).await.unwrap();
        sink.commit().await.unwrap();

        assert!(!temp_path(&output).exists());
        assert_eq!(std::fs::read(&output).unwrap(), b"le");
        assert!(sink.write(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn test_file_sink_abort_removes_tmp() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("file.torrent");

        let mut sink = FileSink::create(&output).await.unwrap();
        sink.write(Bytes::from_static(b"partial")).await.unwrap();
        sink.abort().await.unwrap();

        assert!(!temp_path(&output).exists());
        assert!(!output.exists());
        // a second abort is harmless
        sink.abort().await.unwrap();
    }
}
