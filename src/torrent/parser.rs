//! Torrent file parser
//!
//! Bencode decoding and encoding on top of `serde_bencode`, plus loaders
//! that turn raw bytes into a validated [`Metainfo`].

use serde_bencode::value::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, trace};

use crate::error::{Result, TorrentError};
use crate::torrent::metainfo::Metainfo;

/// A decoded bencode dictionary
pub type Dict = HashMap<Vec<u8>, Value>;

/// Typed accessors for decoded bencode values
pub trait ValueExt {
    fn as_int(&self) -> Option<i64>;
    fn as_bytes(&self) -> Option<&[u8]>;
    /// Byte string that is valid UTF-8
    fn as_str(&self) -> Option<&str>;
    fn as_list(&self) -> Option<&[Value]>;
    fn as_dict(&self) -> Option<&Dict>;
}

impl ValueExt for Value {
    fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }
}

/// Bencode byte string holding `s`
pub fn string(s: impl AsRef<str>) -> Value {
    Value::Bytes(s.as_ref().as_bytes().to_vec())
}

/// Decode one bencoded value
pub fn decode(data: &[u8]) -> Result<Value> {
    serde_bencode::from_bytes(data).map_err(|e| {
        error!("Failed to decode bencode data: {}", e);
        TorrentError::parse_error_with_source("Invalid bencode data", e.to_string())
    })
}

/// Encode a value; dictionary keys come out byte-sorted
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    serde_bencode::to_bytes(value).map_err(|e| {
        error!("Failed to encode bencode data: {}", e);
        TorrentError::parse_error_with_source("Failed to encode bencode data", e.to_string())
    })
}

/// Loader for .torrent files
pub struct TorrentParser;

impl TorrentParser {
    /// Parse and validate a .torrent file from bytes
    pub fn parse_bytes(data: &[u8]) -> Result<Metainfo> {
        debug!("Parsing torrent file from {} bytes", data.len());
        trace!("Torrent data (first 100 bytes): {:?}", &data[..data.len().min(100)]);

        let metainfo = Metainfo::from_value(decode(data)?)?;
        info!("Parsed torrent {} ({})", metainfo.info().name, metainfo.info_hash_hex());
        Ok(metainfo)
    }

    /// Parse a .torrent file from a file path
    pub fn parse_file(path: &Path) -> Result<Metainfo> {
        info!("Loading torrent file from: {}", path.display());

        let data = std::fs::read(path).map_err(|e| {
            error!("Failed to read torrent file '{}': {}", path.display(), e);
            TorrentError::from_io("Failed to read torrent file", path, &e)
        })?;

        debug!("Read {} bytes from torrent file", data.len());
        Self::parse_bytes(&data)
    }

    /// Async variant of [`parse_file`](Self::parse_file)
    pub async fn read_file(path: &Path) -> Result<Metainfo> {
        info!("Loading torrent file from: {}", path.display());

        let data = tokio::fs::read(path).await.map_err(|e| {
            error!("Failed to read torrent file '{}': {}", path.display(), e);
            TorrentError::from_io("Failed to read torrent file", path, &e)
        })?;

        debug!("Read {} bytes from torrent file", data.len());
        Self::parse_bytes(&data)
    }

    /// Download and parse a remote .torrent file
    #[cfg(feature = "remote")]
    pub async fn fetch(url: &str) -> Result<Metainfo> {
        info!("Fetching torrent file from: {}", url);

        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("Failed to fetch torrent file '{}': {}", url, e);
                TorrentError::io_error_full("Failed to fetch torrent file", url, e.to_string())
            })?;
        let data = response
            .bytes()
            .await
            .map_err(|e| TorrentError::io_error_full("Failed to read response body", url, e.to_string()))?;

        debug!("Downloaded {} bytes", data.len());
        Self::parse_bytes(&data)
    }

    /// Load from a local path, or from a URL when the `remote` feature is on
    pub async fn load(source: &str) -> Result<Metainfo> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Self::load_remote(source).await;
        }
        Self::read_file(Path::new(source)).await
    }

    #[cfg(feature = "remote")]
    async fn load_remote(url: &str) -> Result<Metainfo> {
        Self::fetch(url).await
    }

    #[cfg(not(feature = "remote"))]
    async fn load_remote(url: &str) -> Result<Metainfo> {
        Err(TorrentError::config_error_with_field(
            format!("Cannot fetch {}: built without the `remote` feature", url),
            "torrent",
        ))
    }
}
