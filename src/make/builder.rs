//! Metainfo builder
//!
//! Hashes a set of files and assembles the bencoded metainfo around the
//! digests. The dictionary is encoded once with a zero-filled `pieces`
//! placeholder of the final size; the bytes before the placeholder go out
//! immediately, the digests follow in index order as hashing proceeds and
//! the remaining bytes close the file.

use bytes::Bytes;
use serde_bencode::value::Value;
use std::path::Path;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TorrentError};
use crate::hash::{
    FileEntry, FileSource, HashEvent, HashOptions, Hasher, HasherControl, OrderedRelay, PieceLayout, Progress,
    DEFAULT_CHUNK_SIZE, DEFAULT_PIECE_LENGTH, MAX_FILES_OPENED,
};
use crate::make::sink::{FileSink, MemorySink, MetainfoSink};
use crate::torrent::metainfo::{unix_now, Metainfo};
use crate::torrent::parser::{encode, string, Dict};
use crate::torrent::schema::{check_announce_list, is_url};

/// `created by` value written by this crate
pub fn default_created_by() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Options for a new torrent
#[derive(Debug, Clone)]
pub struct MakeOptions {
    /// Backup tracker tiers
    pub announce_list: Vec<Vec<String>>,
    pub comment: Option<String>,
    /// Torrent name in multi-file mode; defaults to the root directory name
    pub name: Option<String>,
    /// Piece length in bytes
    pub piece_length: u64,
    pub private: bool,
    /// Goes into `info`, giving the same content a different info-hash
    pub source: Option<String>,
    /// Extra `info` keys; never replaces a key the builder sets
    pub more_info: Dict,
    /// Use the `files` list even for a single file
    pub multi_file: bool,
    pub created_by: String,
    /// Seconds since the epoch; `None` means now
    pub creation_date: Option<i64>,
    pub max_open_files: usize,
    pub max_memory: Option<u64>,
}

impl Default for MakeOptions {
    fn default() -> Self {
        Self {
            announce_list: Vec::new(),
            comment: None,
            name: None,
            piece_length: DEFAULT_PIECE_LENGTH,
            private: false,
            source: None,
            more_info: Dict::new(),
            multi_file: false,
            created_by: default_created_by(),
            creation_date: None,
            max_open_files: MAX_FILES_OPENED,
            max_memory: None,
        }
    }
}

fn to_int(value: u64, field: &str) -> Result<Value> {
    i64::try_from(value)
        .map(Value::Int)
        .map_err(|_| TorrentError::validation_error_with_field(format!("{} does not fit in a bencode integer", value), field))
}

/// Builds one torrent; consumed by [`run`](TorrentMaker::run)
#[derive(Debug)]
pub struct TorrentMaker {
    hasher: Hasher,
    skeleton: Dict,
    name: String,
    multi_file: bool,
}

impl TorrentMaker {
    /// Validate the inputs, enumerate the files and prepare the metainfo
    pub async fn new(
        announce: impl Into<String>,
        dir: impl AsRef<Path>,
        files: FileSource,
        options: MakeOptions,
    ) -> Result<Self> {
        let announce = announce.into();
        let dir = dir.as_ref();

        if !is_url(&announce) {
            return Err(TorrentError::validation_error_with_field(
                format!("Not a URL: {}", announce),
                "announce",
            ));
        }
        let empty = match &files {
            FileSource::Paths(paths) => paths.is_empty(),
            FileSource::Entries(entries) => entries.is_empty(),
        };
        if empty {
            return Err(TorrentError::validation_error_with_field("No files given", "files"));
        }
        check_announce_list(&options.announce_list)?;

        let hash_options = HashOptions {
            max_open_files: options.max_open_files,
            max_memory: options.max_memory,
            stop_on_first_error: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        };
        let hasher = Hasher::new(dir, files, options.piece_length, hash_options).await?;

        let entries = hasher.files();
        let multi_file = options.multi_file || entries.len() > 1;
        let name = if multi_file {
            match &options.name {
                Some(name) => name.clone(),
                None => default_name(dir, &entries).await,
            }
        } else {
            if options.name.is_some() {
                debug!("Ignoring name option for a single-file torrent");
            }
            entries.first().map(FileEntry::joined).unwrap_or_default()
        };

        let skeleton = build_skeleton(&announce, &options, hasher.layout(), &name, multi_file)?;
        info!(
            "Prepared {} torrent {} ({} pieces)",
            if multi_file { "multi-file" } else { "single-file" },
            name,
            hasher.layout().piece_count
        );

        Ok(Self {
            hasher,
            skeleton,
            name,
            multi_file,
        })
    }

    /// Stop handle for the underlying hasher
    pub fn control(&self) -> HasherControl {
        self.hasher.control()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_multi_file(&self) -> bool {
        self.multi_file
    }

    pub fn layout(&self) -> &PieceLayout {
        self.hasher.layout()
    }

    /// Hash everything and stream the metainfo into `sink`.
    ///
    /// The sink is committed on success and aborted on any failure.
    pub async fn run<S>(mut self, sink: &mut S, mut on_progress: impl FnMut(&Progress) + Send) -> Result<Metainfo>
    where
        S: MetainfoSink + ?Sized,
    {
        match self.stream(sink, &mut on_progress).await {
            Ok(metainfo) => {
                sink.commit().await?;
                info!("Created torrent {} ({})", metainfo.info().name, metainfo.info_hash_hex());
                Ok(metainfo)
            }
            Err(e) => {
                self.hasher.destroy();
                if let Err(abort) = sink.abort().await {
                    warn!("Failed to discard partial output: {}", abort);
                }
                Err(e)
            }
        }
    }

    async fn stream<S>(&mut self, sink: &mut S, on_progress: &mut (impl FnMut(&Progress) + Send)) -> Result<Metainfo>
    where
        S: MetainfoSink + ?Sized,
    {
        let encoded = encode(&Value::Dict(self.skeleton.clone()))?;
        let pieces_len = 20 * self.hasher.layout().piece_count as usize;
        let start = locate_pieces(&self.skeleton, &encoded, pieces_len)?;
        sink.write(Bytes::copy_from_slice(&encoded[..start])).await?;

        let mut events = self.hasher.start()?;
        let mut relay = OrderedRelay::new();
        let mut pieces = Vec::with_capacity(pieces_len);

        loop {
            match events.recv().await {
                Some(HashEvent::Hash(result)) => {
                    for ready in relay.push(result) {
                        pieces.extend_from_slice(&ready.digest);
                        sink.write(Bytes::copy_from_slice(&ready.digest)).await?;
                    }
                }
                Some(HashEvent::Progress(progress)) => on_progress(&progress),
                Some(HashEvent::Open(path)) => trace!("Hashing {}", path.display()),
                Some(HashEvent::Error(e)) => return Err(e),
                Some(HashEvent::End) => break,
                None => {
                    return Err(TorrentError::state_error_with_state(
                        "Hashing stopped before completion",
                        self.hasher.state(),
                    ))
                }
            }
        }

        if pieces.len() != pieces_len {
            return Err(TorrentError::state_error(format!(
                "Expected {} bytes of piece hashes, got {}",
                pieces_len,
                pieces.len()
            )));
        }
        sink.write(Bytes::copy_from_slice(&encoded[start + pieces_len..])).await?;

        let mut root = self.skeleton.clone();
        if let Some(Value::Dict(info)) = root.get_mut(b"info".as_slice()) {
            info.insert(b"pieces".to_vec(), Value::Bytes(pieces));
        }
        Metainfo::from_dict(root)
    }
}

/// Basename of the canonical root directory, else the first path segment
async fn default_name(dir: &Path, entries: &[FileEntry]) -> String {
    let canonical = tokio::fs::canonicalize(dir).await.unwrap_or_else(|_| dir.to_path_buf());
    canonical
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .or_else(|| entries.first().and_then(|e| e.path.first().cloned()))
        .unwrap_or_default()
}

fn build_skeleton(announce: &str, options: &MakeOptions, layout: &PieceLayout, name: &str, multi_file: bool) -> Result<Dict> {
    let mut root = Dict::new();
    root.insert(b"announce".to_vec(), string(announce));
    if !options.announce_list.is_empty() {
        let tiers = options
            .announce_list
            .iter()
            .map(|tier| Value::List(tier.iter().map(string).collect()))
            .collect();
        root.insert(b"announce-list".to_vec(), Value::List(tiers));
    }
    if let Some(comment) = &options.comment {
        root.insert(b"comment".to_vec(), string(comment));
    }
    root.insert(b"created by".to_vec(), string(&options.created_by));
    root.insert(
        b"creation date".to_vec(),
        Value::Int(options.creation_date.unwrap_or_else(unix_now)),
    );

    let mut info = Dict::new();
    if multi_file {
        let files = layout
            .files()
            .map(|file| -> Result<Value> {
                let mut entry = Dict::new();
                entry.insert(b"length".to_vec(), to_int(file.length, "length")?);
                entry.insert(b"path".to_vec(), Value::List(file.path.iter().map(string).collect()));
                Ok(Value::Dict(entry))
            })
            .collect::<Result<Vec<_>>>()?;
        info.insert(b"files".to_vec(), Value::List(files));
    } else {
        info.insert(b"length".to_vec(), to_int(layout.total_size, "length")?);
    }
    info.insert(b"name".to_vec(), string(name));
    info.insert(b"piece length".to_vec(), to_int(layout.piece_length, "piece_length")?);
    info.insert(b"pieces".to_vec(), Value::Bytes(vec![0u8; 20 * layout.piece_count as usize]));
    if options.private {
        info.insert(b"private".to_vec(), Value::Int(1));
    }
    if let Some(source) = &options.source {
        info.insert(b"source".to_vec(), string(source));
    }
    for (key, value) in &options.more_info {
        if info.contains_key(key) {
            debug!("Ignoring extra info key {:?}: already set", String::from_utf8_lossy(key));
        } else {
            info.insert(key.clone(), value.clone());
        }
    }

    root.insert(b"info".to_vec(), Value::Dict(info));
    Ok(root)
}

/// Offset of the value stored under `key` in the encoding of `dict`.
/// Entries are encoded in byte order of their keys.
fn value_offset(dict: &Dict, key: &[u8]) -> Result<usize> {
    let mut offset = 1;
    for (k, v) in dict.iter().filter(|(k, _)| k.as_slice() < key) {
        offset += encode(&Value::Bytes(k.clone()))?.len() + encode(v)?.len();
    }
    Ok(offset + encode(&Value::Bytes(key.to_vec()))?.len())
}

/// Offset of the first placeholder byte of `info.pieces` in `encoded`
fn locate_pieces(root: &Dict, encoded: &[u8], pieces_len: usize) -> Result<usize> {
    let Some(Value::Dict(info)) = root.get(b"info".as_slice()) else {
        return Err(TorrentError::state_error("Metainfo has no info dictionary"));
    };
    let marker = format!("6:pieces{}:", pieces_len);
    let start = value_offset(root, b"info")? + value_offset(info, b"pieces")? + marker.len() - b"6:pieces".len();

    let placeholder = encoded.get(..start).is_some_and(|head| head.ends_with(marker.as_bytes()))
        && encoded
            .get(start..start + pieces_len)
            .is_some_and(|run| run.iter().all(|&b| b == 0));
    if !placeholder {
        return Err(TorrentError::state_error("Could not locate the pieces placeholder"));
    }
    Ok(start)
}

/// Build a torrent entirely in memory
pub async fn make_bytes(
    announce: impl Into<String>,
    dir: impl AsRef<Path>,
    files: FileSource,
    options: MakeOptions,
) -> Result<(Metainfo, Bytes)> {
    let maker = TorrentMaker::new(announce, dir, files, options).await?;
    let mut sink = MemorySink::new();
    let metainfo = maker.run(&mut sink, |_| {}).await?;
    Ok((metainfo, sink.into_bytes()))
}

/// Build a torrent and write it atomically to `output`
pub async fn make_write(
    output: impl AsRef<Path>,
    announce: impl Into<String>,
    dir: impl AsRef<Path>,
    files: FileSource,
    options: MakeOptions,
    on_progress: impl FnMut(&Progress) + Send,
) -> Result<Metainfo> {
    let maker = TorrentMaker::new(announce, dir, files, options).await?;
    let mut sink = FileSink::create(output.as_ref()).await?;
    maker.run(&mut sink, on_progress).await
}
