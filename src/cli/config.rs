//! CLI configuration module
//!
//! Turns parsed arguments into validated options for the library.

use crate::cli::args::{CheckArgs, CliArgs, EditArgs, MakeArgs};
use crate::error::{Result, TorrentError};
use crate::make::MakeOptions;
use crate::torrent::{Change, EditOptions, TorrentInfo};
use crate::verify::CheckOptions;
use std::path::{Path, PathBuf};

/// Smallest and largest accepted piece length exponent
pub const PIECE_LENGTH_EXPONENTS: std::ops::RangeInclusive<u32> = 10..=30;

/// Parse a human readable size such as `512MB`, `300.50MB`, `1GiB` or
/// `4096`. Units are binary: `1KB` is 1024 bytes.
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: f64 = number
        .parse()
        .map_err(|_| TorrentError::config_error_with_field(format!("Invalid size: {}", input), "max_memory"))?;
    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        "t" | "tb" | "tib" => 1 << 40,
        other => {
            return Err(TorrentError::config_error_with_field(
                format!("Unknown size unit `{}` in {}", other, input),
                "max_memory",
            ))
        }
    };

    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes < 1.0 || bytes > u64::MAX as f64 {
        return Err(TorrentError::config_error_with_field(
            format!("Size out of range: {}", input),
            "max_memory",
        ));
    }
    Ok(bytes as u64)
}

/// Split repeated `-a` URLs into the announce URL and announce-list tiers.
/// With more than one URL every URL becomes its own tier.
pub fn split_announce(urls: &[String]) -> (Option<String>, Vec<Vec<String>>) {
    let announce = urls.first().cloned();
    let tiers = if urls.len() > 1 {
        urls.iter().map(|url| vec![url.clone()]).collect()
    } else {
        Vec::new()
    };
    (announce, tiers)
}

/// Append `.torrent` unless the path already ends with it
pub fn with_torrent_extension(path: impl Into<PathBuf>) -> PathBuf {
    let mut path = path.into();
    if path.extension().and_then(|e| e.to_str()) != Some("torrent") {
        let mut name = path.clone().into_os_string();
        name.push(".torrent");
        path = PathBuf::from(name);
    }
    path
}

/// Configuration for one CLI run
#[derive(Debug, Clone)]
pub struct Config {
    /// Main announce URL (make and edit)
    pub announce: Option<String>,
    pub announce_list: Vec<Vec<String>>,
    /// Input paths for make
    pub files: Vec<String>,
    /// Torrent to read for edit and hashcheck
    pub torrent: Option<String>,
    /// Root directory of the content
    pub dir: PathBuf,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub source: Option<String>,
    pub private: bool,
    pub multi_file: bool,
    /// Piece length as a power of two
    pub piece_length_exp: u32,
    pub max_open_files: usize,
    pub max_memory: Option<u64>,
    pub verbose: bool,
    pub quiet: bool,
}

impl Config {
    fn base(cli: &CliArgs) -> Self {
        Self {
            announce: None,
            announce_list: Vec::new(),
            files: Vec::new(),
            torrent: None,
            dir: PathBuf::from("."),
            output: None,
            name: None,
            comment: None,
            source: None,
            private: false,
            multi_file: false,
            piece_length_exp: 18,
            max_open_files: 250,
            max_memory: None,
            verbose: cli.verbose,
            quiet: cli.quiet,
        }
    }

    /// Configuration for `make`
    pub fn from_make_args(cli: &CliArgs, args: &MakeArgs) -> Result<Self> {
        let (announce, announce_list) = split_announce(&args.announce);
        Ok(Self {
            announce,
            announce_list,
            files: args.files.clone(),
            dir: args.dir.clone(),
            output: args.output.clone(),
            name: args.name.clone(),
            comment: args.comment.clone(),
            source: args.source.clone(),
            private: args.private,
            multi_file: args.multi,
            piece_length_exp: args.piece_length,
            max_open_files: args.max_files,
            max_memory: args.max_memory.as_deref().map(parse_size).transpose()?,
            ..Self::base(cli)
        })
    }

    /// Configuration for `hashcheck`
    pub fn from_check_args(cli: &CliArgs, args: &CheckArgs) -> Result<Self> {
        Ok(Self {
            torrent: Some(args.torrent.clone()),
            dir: args.dir.clone(),
            max_open_files: args.max_files,
            max_memory: args.max_memory.as_deref().map(parse_size).transpose()?,
            ..Self::base(cli)
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !PIECE_LENGTH_EXPONENTS.contains(&self.piece_length_exp) {
            return Err(TorrentError::config_error_with_field(
                format!(
                    "Piece length exponent must be between {} and {}, got {}",
                    PIECE_LENGTH_EXPONENTS.start(),
                    PIECE_LENGTH_EXPONENTS.end(),
                    self.piece_length_exp
                ),
                "piece_length",
            ));
        }

        if self.max_open_files == 0 {
            return Err(TorrentError::config_error_with_field(
                "max_files must be at least 1",
                "max_files",
            ));
        }

        if self.dir.as_os_str().is_empty() {
            return Err(TorrentError::config_error_with_field("dir cannot be empty", "dir"));
        }

        if self.torrent.is_none() {
            if self.announce.is_none() {
                return Err(TorrentError::config_error_with_field(
                    "Must provide at least one announce URL",
                    "announce",
                ));
            }
            if self.files.is_empty() {
                return Err(TorrentError::config_error_with_field("No files given", "files"));
            }
        }

        Ok(())
    }

    pub fn piece_length(&self) -> u64 {
        1u64 << self.piece_length_exp
    }

    /// `--output`, else `--name`, else the first input, with `.torrent`
    pub fn output_path(&self) -> PathBuf {
        let base = match (&self.output, &self.name, self.files.first()) {
            (Some(output), _, _) => output.clone(),
            (None, Some(name), _) => PathBuf::from(name),
            (None, None, Some(first)) => {
                let trimmed = first.trim_end_matches('/');
                match Path::new(trimmed).file_name() {
                    Some(file_name) => PathBuf::from(file_name),
                    None => PathBuf::from(self.dir_name()),
                }
            }
            (None, None, None) => PathBuf::from(self.dir_name()),
        };
        with_torrent_extension(base)
    }

    fn dir_name(&self) -> String {
        std::fs::canonicalize(&self.dir)
            .ok()
            .and_then(|dir| dir.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .unwrap_or_else(|| "torrent".to_string())
    }

    pub fn make_options(&self) -> MakeOptions {
        MakeOptions {
            announce_list: self.announce_list.clone(),
            comment: self.comment.clone(),
            name: self.name.clone(),
            piece_length: self.piece_length(),
            private: self.private,
            source: self.source.clone(),
            multi_file: self.multi_file,
            max_open_files: self.max_open_files,
            max_memory: self.max_memory,
            ..Default::default()
        }
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            max_open_files: self.max_open_files,
            max_memory: self.max_memory,
        }
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

/// Edits requested by `edit`; `-p` toggles against the current torrent
pub fn edit_options(args: &EditArgs, current: &TorrentInfo) -> EditOptions {
    let (announce, tiers) = split_announce(&args.announce);
    let announce_list = if args.no_announce_list {
        Change::Remove
    } else if tiers.is_empty() {
        Change::Keep
    } else {
        Change::Set(tiers)
    };

    EditOptions {
        announce,
        announce_list,
        comment: change(args.comment.clone(), args.no_comment),
        name: args.name.clone(),
        private: args.private.then_some(!current.private),
        source: change(args.source.clone(), args.no_source),
    }
}

fn change<T>(value: Option<T>, remove: bool) -> Change<T> {
    match (value, remove) {
        (Some(value), _) => Change::Set(value),
        (None, true) => Change::Remove,
        (None, false) => Change::Keep,
    }
}

/// `--output`, else the input path, with `.torrent`
pub fn edit_output(args: &EditArgs) -> PathBuf {
    with_torrent_extension(args.output.clone().unwrap_or_else(|| PathBuf::from(&args.torrent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::Command;
    use clap::Parser;

    fn make_config(argv: &[&str]) -> Result<Config> {
        let cli = CliArgs::try_parse_from(argv).unwrap();
        let Command::Make(args) = &cli.command else {
            panic!("expected make");
        };
        Config::from_make_args(&cli, args)
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("512MB").unwrap(), 512 << 20);
        assert_eq!(parse_size("1GiB").unwrap(), 1 << 30);
        assert_eq!(parse_size("10 kb").unwrap(), 10 << 10);
        assert_eq!(parse_size("300.50MB").unwrap(), 315_097_088);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("0").is_err());
    }

    #[test]
    fn test_split_announce() {
        let (announce, tiers) = split_announce(&["http://a".to_string()]);
        assert_eq!(announce.as_deref(), Some("http://a"));
        assert!(tiers.is_empty());

        let (announce, tiers) = split_announce(&["http://a".to_string(), "udp://b:80".to_string()]);
        assert_eq!(announce.as_deref(), Some("http://a"));
        assert_eq!(tiers, vec![vec!["http://a".to_string()], vec!["udp://b:80".to_string()]]);
    }

    #[test]
    fn test_config_from_make_args() {
        let config = make_config(&["nt", "make", "-a", "http://a", "-l", "20", "-m", "1MB", "-n", "movie", "dir/"]).unwrap();
        config.validate().unwrap();
        assert_eq!(config.piece_length(), 1 << 20);
        assert_eq!(config.max_memory, Some(1 << 20));
        assert_eq!(config.output_path(), PathBuf::from("movie.torrent"));

        let options = config.make_options();
        assert_eq!(options.piece_length, 1 << 20);
        assert_eq!(options.name.as_deref(), Some("movie"));
        assert!(options.announce_list.is_empty());
    }

    #[test]
    fn test_output_path_derivation() {
        let config = make_config(&["nt", "make", "-a", "http://a", "some/dir/"]).unwrap();
        assert_eq!(config.output_path(), PathBuf::from("dir.torrent"));

        let config = make_config(&["nt", "make", "-a", "http://a", "-o", "x.torrent", "f"]).unwrap();
        assert_eq!(config.output_path(), PathBuf::from("x.torrent"));

        let config = make_config(&["nt", "make", "-a", "http://a", "-o", "out/x", "f"]).unwrap();
        assert_eq!(config.output_path(), PathBuf::from("out/x.torrent"));
    }

    #[test]
    fn test_config_validate() {
        let config = make_config(&["nt", "make", "-a", "http://a", "-l", "9", "f"]).unwrap();
        assert!(matches!(config.validate(), Err(TorrentError::ConfigError { .. })));

        let config = make_config(&["nt", "make", "-a", "http://a", "-l", "31", "f"]).unwrap();
        assert!(config.validate().is_err());

        let config = make_config(&["nt", "make", "-a", "http://a", "-f", "0", "f"]).unwrap();
        assert!(config.validate().is_err());

        assert!(make_config(&["nt", "make", "-a", "http://a", "-m", "much", "f"]).is_err());
    }

    #[test]
    fn test_check_config() {
        let cli = CliArgs::try_parse_from(["nt", "hashcheck", "-d", "data", "-f", "8", "x.torrent"]).unwrap();
        let Command::Hashcheck(args) = &cli.command else {
            panic!("expected hashcheck");
        };
        let config = Config::from_check_args(&cli, args).unwrap();
        config.validate().unwrap();
        assert_eq!(config.dir, PathBuf::from("data"));
        assert_eq!(config.check_options().max_open_files, 8);
    }

    #[test]
    fn test_edit_options() {
        let cli = CliArgs::try_parse_from(["nt", "edit", "-p", "--no-source", "-c", "hi", "in"]).unwrap();
        let Command::Edit(args) = &cli.command else {
            panic!("expected edit");
        };
        let current = TorrentInfo {
            private: true,
            ..Default::default()
        };
        let options = edit_options(args, &current);
        assert_eq!(options.private, Some(false));
        assert_eq!(options.source, Change::Remove);
        assert_eq!(options.comment, Change::Set("hi".to_string()));
        assert!(options.announce_list.is_keep());
        assert!(options.announce.is_none());
        assert_eq!(edit_output(args), PathBuf::from("in.torrent"));
    }
}
