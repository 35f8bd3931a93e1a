//! rust-torrent-maker
//!
//! Create, inspect, edit and hash-check BitTorrent metainfo files, hashing
//! pieces concurrently with bounded open files and memory.

pub mod cli;
pub mod error;
pub mod hash;
pub mod make;
pub mod torrent;
pub mod verify;

pub use error::{Result, TorrentError};

pub use cli::{CliArgs, Command, Config, ProgressDisplay};
pub use hash::{
    enumerate, map_pieces, EngineState, FileEntry, FileSource, HashEvent, HashOptions, HashResult, Hasher,
    HasherControl, OrderedRelay, PieceLayout, Progress,
};
pub use make::{make_bytes, make_write, FileSink, MakeOptions, MemorySink, MetainfoSink, TorrentMaker};
pub use torrent::{Change, EditOptions, Metainfo, TorrentFile, TorrentInfo, TorrentParser};
pub use verify::{CheckEvent, CheckOptions, CheckReport, HashCheck, PieceCheck};
