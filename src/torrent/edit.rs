//! Metadata editing
//!
//! Changes the descriptive fields of an existing metainfo without hashing
//! anything again. Only `name`, `private` and `source` live inside `info`,
//! so those are the edits that change the info-hash.

use bytes::Bytes;
use serde_bencode::value::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, TorrentError};
use crate::make::sink::{FileSink, MetainfoSink};
use crate::torrent::metainfo::{unix_now, Metainfo};
use crate::torrent::parser::{string, Dict};
use crate::torrent::schema::{check_announce_list, is_url};
use crate::torrent::TorrentParser;

/// What to do with one optional field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Change<T> {
    #[default]
    Keep,
    Set(T),
    Remove,
}

impl<T> Change<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Change::Keep)
    }
}

/// Requested edits; everything defaults to [`Change::Keep`]
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    pub announce: Option<String>,
    pub announce_list: Change<Vec<Vec<String>>>,
    pub comment: Change<String>,
    /// Ignored for single-file torrents, where the name is the file name
    pub name: Option<String>,
    pub private: Option<bool>,
    pub source: Change<String>,
}

fn apply_change(dict: &mut Dict, key: &str, change: &Change<Value>) {
    match change {
        Change::Keep => {}
        Change::Set(value) => {
            dict.insert(key.as_bytes().to_vec(), value.clone());
        }
        Change::Remove => {
            dict.remove(key.as_bytes());
        }
    }
}

fn as_value(change: &Change<String>) -> Change<Value> {
    match change {
        Change::Keep => Change::Keep,
        Change::Set(s) => Change::Set(string(s)),
        Change::Remove => Change::Remove,
    }
}

/// Apply `options` to `metainfo` and stamp `creation date` with `now`
pub fn apply(metainfo: &mut Metainfo, options: &EditOptions, now: i64) -> Result<()> {
    if let Some(announce) = &options.announce {
        if !is_url(announce) {
            return Err(TorrentError::validation_error_with_field(
                format!("Not a URL: {}", announce),
                "announce",
            ));
        }
    }
    if let Change::Set(list) = &options.announce_list {
        check_announce_list(list)?;
    }

    let announce_list = match &options.announce_list {
        Change::Keep => Change::Keep,
        Change::Remove => Change::Remove,
        Change::Set(list) => Change::Set(Value::List(
            list.iter()
                .map(|tier| Value::List(tier.iter().map(string).collect()))
                .collect(),
        )),
    };
    let private = match options.private {
        None => Change::Keep,
        Some(true) => Change::Set(Value::Int(1)),
        Some(false) => Change::Remove,
    };

    let multi_file = metainfo.info().is_multi_file();
    if options.name.is_some() && !multi_file {
        warn!("Ignoring new name: single-file torrents are named after their file");
    }

    metainfo.update(|root| {
        if let Some(announce) = &options.announce {
            root.insert(b"announce".to_vec(), string(announce));
        }
        apply_change(root, "announce-list", &announce_list);
        apply_change(root, "comment", &as_value(&options.comment));
        root.insert(b"creation date".to_vec(), Value::Int(now));

        if let Some(Value::Dict(info)) = root.get_mut(b"info".as_slice()) {
            if let (Some(name), true) = (&options.name, multi_file) {
                info.insert(b"name".to_vec(), string(name));
            }
            apply_change(info, "private", &private);
            apply_change(info, "source", &as_value(&options.source));
        }
    })?;

    debug!("Edited torrent, info-hash now {}", metainfo.info_hash_hex());
    Ok(())
}

/// Write `metainfo` atomically to `output`
pub async fn write_metainfo(metainfo: &Metainfo, output: &Path) -> Result<()> {
    let bytes = metainfo.to_bytes()?;
    let mut sink = FileSink::create(output).await?;
    if let Err(e) = sink.write(Bytes::from(bytes)).await {
        sink.abort().await.ok();
        return Err(e);
    }
    sink.commit().await
}

/// Read `input`, apply `options` and write the result atomically to `output`
pub async fn edit_write(input: &str, output: &Path, options: &EditOptions) -> Result<Metainfo> {
    let mut metainfo = TorrentParser::load(input).await?;
    apply(&mut metainfo, options, unix_now())?;
    write_metainfo(&metainfo, output).await?;

    info!("Edited {} -> {}", input, output.display());
    Ok(metainfo)
}
