//! Error types for fleetsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use fleetsync_core::ConfigError;

/// All errors that can arise from fetching records or syncing the sheet.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sheet read returned no `values` container at all.
    #[error("could not retrieve sheet data ({0})")]
    Retrieval(String),

    /// The sheet write was not acknowledged with the expected row count.
    #[error("spreadsheet update failed ({0})")]
    SyncFailure(String),

    /// Transport or HTTP status failure talking to an external service.
    #[error("{service} request failed: {source}")]
    Service {
        service: &'static str,
        #[source]
        source: Box<ureq::Error>,
    },

    /// The service answered, but the body could not be read or decoded.
    #[error("{service} response unreadable: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The service answered with a shape we do not understand.
    #[error("unexpected {service} response: {message}")]
    Protocol {
        service: &'static str,
        message: String,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Short stable label used to count cycle outcomes.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            SyncError::Retrieval(_) => "retrieval_failure",
            SyncError::SyncFailure(_) => "sync_failure",
            SyncError::Service { .. } | SyncError::Transport { .. } => "service_error",
            SyncError::Protocol { .. } => "protocol_error",
            SyncError::Io { .. } => "io_error",
            SyncError::Json(_) => "json_error",
            SyncError::Config(_) => "config_error",
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
