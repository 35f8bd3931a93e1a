//! Error types for the torrent maker
//!
//! This module defines the error taxonomy shared by enumeration, hashing,
//! metainfo assembly, hash-checking and the metainfo reader.

use std::fmt;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, TorrentError>;

/// Error type for torrent operations
#[derive(Debug, Clone)]
pub enum TorrentError {
    /// Missing path, or an open/read/stat/write failure
    IoError {
        message: String,
        path: Option<String>,
        source: Option<String>,
    },

    /// Invalid input: bad announce URL, empty file list, unsafe path...
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// Operation not allowed in the current engine state
    StateError {
        message: String,
        state: Option<String>,
    },

    /// Decoded metainfo failed structural validation
    SchemaError {
        message: String,
    },

    /// Bencode decoding or encoding errors
    ParseError {
        message: String,
        source: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },
}

impl TorrentError {
    /// Create a new IoError
    pub fn io_error(message: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Create a new IoError with path
    pub fn io_error_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: Some(path.into()),
            source: None,
        }
    }

    /// Create a new IoError with path and source
    pub fn io_error_full(message: impl Into<String>, path: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::IoError {
            message: message.into(),
            path: Some(path.into()),
            source: Some(source.into()),
        }
    }

    /// Create a new ValidationError
    pub fn validation_error(message: impl Into<String>) -> Self {
        TorrentError::ValidationError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ValidationError with field
    pub fn validation_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new StateError
    pub fn state_error(message: impl Into<String>) -> Self {
        TorrentError::StateError {
            message: message.into(),
            state: None,
        }
    }

    /// Create a new StateError naming the offending state
    pub fn state_error_with_state(message: impl Into<String>, state: impl fmt::Debug) -> Self {
        TorrentError::StateError {
            message: message.into(),
            state: Some(format!("{:?}", state)),
        }
    }

    /// Create a new SchemaError
    pub fn schema_error(message: impl Into<String>) -> Self {
        TorrentError::SchemaError {
            message: message.into(),
        }
    }

    /// Create a new ParseError
    pub fn parse_error(message: impl Into<String>) -> Self {
        TorrentError::ParseError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new ParseError with source
    pub fn parse_error_with_source(message: impl Into<String>, source: impl Into<String>) -> Self {
        TorrentError::ParseError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        TorrentError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Wrap an `std::io::Error` raised while touching `path`
    pub fn from_io(message: impl Into<String>, path: &std::path::Path, err: &std::io::Error) -> Self {
        TorrentError::io_error_full(message, path.display().to_string(), err.to_string())
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = context.into();
        match &mut self {
            TorrentError::IoError { source, .. } | TorrentError::ParseError { source, .. } => {
                *source = Some(source.as_ref().map_or_else(|| ctx.clone(), |s| format!("{}: {}", s, ctx)));
            }
            TorrentError::SchemaError { message } => {
                *message = format!("{} ({})", message, ctx);
            }
            _ => {}
        }
        self
    }

    /// Short name of the error kind, as shown by the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            TorrentError::IoError { .. } => "IOError",
            TorrentError::ValidationError { .. } => "ValidationError",
            TorrentError::StateError { .. } => "StateError",
            TorrentError::SchemaError { .. } => "SchemaError",
            TorrentError::ParseError { .. } => "ParseError",
            TorrentError::ConfigError { .. } => "ConfigError",
        }
    }
}

impl fmt::Display for TorrentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentError::IoError { message, path, source } => {
                match (path, source) {
                    (Some(p), Some(s)) => write!(f, "I/O error: {} (path: {}, source: {})", message, p, s),
                    (Some(p), None) => write!(f, "I/O error: {} (path: {})", message, p),
                    (None, Some(s)) => write!(f, "I/O error: {} (source: {})", message, s),
                    (None, None) => write!(f, "I/O error: {}", message),
                }
            }
            TorrentError::ValidationError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Validation error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Validation error: {}", message)
                }
            }
            TorrentError::StateError { message, state } => {
                if let Some(state_val) = state {
                    write!(f, "State error: {} (state: {})", message, state_val)
                } else {
                    write!(f, "State error: {}", message)
                }
            }
            TorrentError::SchemaError { message } => write!(f, "Schema error: {}", message),
            TorrentError::ParseError { message, source } => {
                if let Some(src) = source {
                    write!(f, "Parse error: {} (source: {})", message, src)
                } else {
                    write!(f, "Parse error: {}", message)
                }
            }
            TorrentError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for TorrentError {}

impl From<std::io::Error> for TorrentError {
    fn from(err: std::io::Error) -> Self {
        TorrentError::IoError {
            message: err.to_string(),
            path: None,
            source: Some(err.kind().to_string()),
        }
    }
}

// Note: serde_bencode::Error is the public type, not de::Error or ser::Error
impl From<serde_bencode::Error> for TorrentError {
    fn from(err: serde_bencode::Error) -> Self {
        TorrentError::parse_error_with_source("Failed to process bencode data", err.to_string())
    }
}

impl From<url::ParseError> for TorrentError {
    fn from(err: url::ParseError) -> Self {
        TorrentError::validation_error(format!("Not a URL: {}", err))
    }
}
