//! CLI module
//!
//! Command-line interface for the torrent maker.

pub mod args;
pub mod config;
pub mod progress;

pub use args::{CheckArgs, CliArgs, Command, EditArgs, FilesArgs, MakeArgs, TorrentArg};
pub use config::{edit_options, edit_output, parse_size, split_announce, with_torrent_extension, Config};
pub use progress::{calculate_eta, format_bytes, format_duration, format_speed, ProgressDisplay};
