use std::path::PathBuf;

use thiserror::Error;

/// Error surface for daemon startup, servers and the sync loop.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] fleetsync_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] fleetsync_sync::SyncError),

    #[error("deployment error: {0}")]
    Deploy(#[from] fleetsync_deploy::DeployError),

    #[error("render error: {0}")]
    Render(#[from] fleetsync_render::RenderError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("task failure: {0}")]
    Task(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
