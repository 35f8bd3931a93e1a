//! CLI arguments module
//!
//! Defines command-line argument parsing using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the torrent maker
#[derive(Debug, Parser)]
#[command(name = "rust-torrent-maker", version)]
#[command(about = "Create, inspect, edit and hash-check BitTorrent metainfo files", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (no output except errors and results)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Make a torrent
    Make(MakeArgs),
    /// Edit the metainfo of a torrent without re-hashing its files
    Edit(EditArgs),
    /// Hash-check a directory against a torrent
    Hashcheck(CheckArgs),
    /// Print the info-hash
    Infohash(TorrentArg),
    /// Print the piece hashes, one per line
    Pieces(TorrentArg),
    /// Print the torrent name
    Name(TorrentArg),
    /// Print the announce URL
    Announce(TorrentArg),
    /// Print the announce-list tiers
    Announcelist(TorrentArg),
    /// Print file paths and lengths
    Files(FilesArgs),
    /// Print web seed URLs
    Urllist(TorrentArg),
    /// Print an overview of the torrent
    Info(TorrentArg),
}

#[derive(Debug, Clone, Args)]
pub struct MakeArgs {
    /// Announce URL; repeat for backup trackers. At least one is required
    #[arg(short, long = "announce", value_name = "URL", required = true)]
    pub announce: Vec<String>,

    /// Add a comment to the metainfo
    #[arg(short, long, value_name = "STR")]
    pub comment: Option<String>,

    /// Name of the torrent (multi-file mode)
    #[arg(short, long, value_name = "STR")]
    pub name: Option<String>,

    /// Set piece length to 2^N bytes
    #[arg(short = 'l', long = "piece-length", value_name = "N", default_value_t = 18)]
    pub piece_length: u32,

    /// Make this a private torrent
    #[arg(short, long)]
    pub private: bool,

    /// Source tag stored in the info dictionary
    #[arg(short, long, value_name = "STR")]
    pub source: Option<String>,

    /// Where to write the output file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Max simultaneous files to open
    #[arg(short = 'f', long = "max-files", value_name = "INT", default_value_t = 250)]
    pub max_files: usize,

    /// Max bytes of file content in flight, e.g. 512MB
    #[arg(short = 'm', long = "max-memory", value_name = "SIZE")]
    pub max_memory: Option<String>,

    /// Torrent root directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub dir: PathBuf,

    /// Use multi-file mode even for a single file
    #[arg(long)]
    pub multi: bool,

    /// Files and directories to add, relative to the root directory
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    /// New announce URL; repeat to replace the announce-list too
    #[arg(short, long = "announce", value_name = "URL")]
    pub announce: Vec<String>,

    /// Drop the announce-list
    #[arg(long, conflicts_with = "announce")]
    pub no_announce_list: bool,

    /// Set the comment
    #[arg(short, long, value_name = "STR")]
    pub comment: Option<String>,

    /// Drop the comment
    #[arg(long, conflicts_with = "comment")]
    pub no_comment: bool,

    /// New name; only applies to multi-file torrents
    #[arg(short, long, value_name = "STR")]
    pub name: Option<String>,

    /// Toggle private mode
    #[arg(short, long)]
    pub private: bool,

    /// Set the source tag
    #[arg(short, long, value_name = "STR")]
    pub source: Option<String>,

    /// Drop the source tag
    #[arg(long, conflicts_with = "source")]
    pub no_source: bool,

    /// Where to write the output file; defaults to the input
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Torrent file to edit
    #[arg(value_name = "TORRENT")]
    pub torrent: String,
}

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Directory to hash-check
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub dir: PathBuf,

    /// Max simultaneous files to open
    #[arg(short = 'f', long = "max-files", value_name = "INT", default_value_t = 250)]
    pub max_files: usize,

    /// Max bytes of file content in flight, e.g. 512MB
    #[arg(short = 'm', long = "max-memory", value_name = "SIZE")]
    pub max_memory: Option<String>,

    /// Torrent file to check against
    #[arg(value_name = "TORRENT")]
    pub torrent: String,
}

#[derive(Debug, Clone, Args)]
pub struct TorrentArg {
    /// Torrent file
    #[arg(value_name = "TORRENT")]
    pub torrent: String,
}

#[derive(Debug, Clone, Args)]
pub struct FilesArgs {
    /// Print a JSON array instead of lines
    #[arg(long)]
    pub json: bool,

    /// Torrent file
    #[arg(value_name = "TORRENT")]
    pub torrent: String,
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the log level based on verbosity settings
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::ERROR
        } else {
            tracing::Level::WARN
        }
    }
}
