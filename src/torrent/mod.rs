//! Torrent file handling module
//!
//! Bencode decoding, metainfo validation, the typed view of a torrent and
//! metadata edits.

pub mod edit;
pub mod info;
pub mod metainfo;
pub mod parser;
pub mod schema;

pub use edit::{apply as apply_edit, edit_write, write_metainfo, Change, EditOptions};
pub use info::{TorrentFile, TorrentInfo};
pub use metainfo::{unix_now, Metainfo};
pub use parser::{Dict, TorrentParser, ValueExt};
pub use schema::{is_url, URL_SCHEMES};
