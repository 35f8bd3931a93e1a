//! Torrent creation module
//!
//! Builds metainfo from files on disk and streams it to memory or to an
//! atomically replaced output file.

pub mod builder;
pub mod sink;

pub use builder::{default_created_by, make_bytes, make_write, MakeOptions, TorrentMaker};
pub use sink::{temp_path, FileSink, MemorySink, MetainfoSink};
