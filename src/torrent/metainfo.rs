//! Decoded metainfo
//!
//! Keeps the raw root dictionary next to its validated typed view, so keys
//! this crate does not know about survive a decode/encode round trip.

use serde_bencode::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{Result, TorrentError};
use crate::torrent::info::TorrentInfo;
use crate::torrent::parser::{encode, Dict};
use crate::torrent::schema;

/// Seconds since the unix epoch, as stored in `creation date`
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A validated metainfo file
#[derive(Debug, Clone, PartialEq)]
pub struct Metainfo {
    root: Dict,
    info: TorrentInfo,
}

impl Metainfo {
    /// Validate a decoded value
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Dict(root) => Self::from_dict(root),
            _ => Err(TorrentError::schema_error("Torrent is not a dictionary")),
        }
    }

    /// Validate a decoded root dictionary and compute its info-hash
    pub fn from_dict(root: Dict) -> Result<Self> {
        let mut info = schema::validate_dict(&root)?;
        let info_value = root
            .get(b"info".as_slice())
            .ok_or_else(|| TorrentError::schema_error("`info` field not found"))?;
        info.info_hash = TorrentInfo::generate_info_hash(&encode(info_value)?);
        debug!("Info-hash of {} is {}", info.name, info.info_hash_hex());
        Ok(Self { root, info })
    }

    /// Typed view
    pub fn info(&self) -> &TorrentInfo {
        &self.info
    }

    /// Raw root dictionary
    pub fn root(&self) -> &Dict {
        &self.root
    }

    /// Raw `info` dictionary
    pub fn info_dict(&self) -> Option<&Dict> {
        match self.root.get(b"info".as_slice()) {
            Some(Value::Dict(info)) => Some(info),
            _ => None,
        }
    }

    pub fn info_hash(&self) -> [u8; 20] {
        self.info.info_hash
    }

    pub fn info_hash_hex(&self) -> String {
        self.info.info_hash_hex()
    }

    /// Bencoded form of the whole file
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(&Value::Dict(self.root.clone()))
    }

    /// Bencoded `info` dictionary, the input of the info-hash
    pub fn info_bytes(&self) -> Result<Vec<u8>> {
        match self.root.get(b"info".as_slice()) {
            Some(info) => encode(info),
            None => Err(TorrentError::schema_error("`info` field not found")),
        }
    }

    /// Apply `change` to a copy of the root dictionary and revalidate.
    /// On failure `self` is left untouched.
    pub fn update(&mut self, change: impl FnOnce(&mut Dict)) -> Result<()> {
        let mut root = self.root.clone();
        change(&mut root);
        *self = Self::from_dict(root)?;
        Ok(())
    }

    pub fn into_dict(self) -> Dict {
        self.root
    }
}
