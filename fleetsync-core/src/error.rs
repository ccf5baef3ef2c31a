//! Error types for fleetsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// A value did not match the grammar it was expected to follow.
///
/// Always recoverable: callers skip the affected record or field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("identifier does not match rsync://<experiment>.<machine>:<port>/<module>: {id}")]
    Identifier { id: String },

    #[error("not an x-prefixed timestamp: {raw:?}")]
    Timestamp { raw: String },
}

/// All errors that can arise while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading the config file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, with the file path for context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,

    /// A field failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),
}
