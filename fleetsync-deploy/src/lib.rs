//! Deployed-set resolution for `fleetsync-deploy`.
//!
//! `DeployedSetResolver::resolve(namespace)` reads every configured
//! deployment source, keeps the deployments in `namespace`, and composes each
//! one's selector labels into an endpoint identifier. The result is cached for
//! the configured TTL (an hour by default); failed reads are not cached.

pub mod manifest;
pub mod resolver;

use std::path::PathBuf;

use thiserror::Error;

pub use manifest::{deployed_ids, parse_manifest, Deployment};
pub use resolver::{DeployedSet, DeployedSetResolver};

/// Errors from reading deployment sources.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse deployments from {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("deployment registry {url} failed: {source}")]
    Registry {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
}
