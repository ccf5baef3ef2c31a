//! OAuth access tokens for the Sheets and Datastore REST APIs.
//!
//! Two sources:
//! - [`StaticToken`]: a bearer token handed in through the environment
//!   (`FLEETSYNC_ACCESS_TOKEN`), for local runs and emulators.
//! - [`MetadataToken`]: the default service account of the VM, read from the
//!   GCE metadata server and cached for a few minutes.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use fleetsync_core::TimedCache;

use crate::error::SyncError;
use crate::http::{read_json, service_err};

/// Environment variable holding a pre-minted bearer token.
pub const TOKEN_ENV: &str = "FLEETSYNC_ACCESS_TOKEN";

const METADATA_BASE: &str = "http://metadata.google.internal/computeMetadata/v1";

/// Metadata tokens live an hour; refresh well before that.
const METADATA_TOKEN_TTL: Duration = Duration::from_secs(300);

pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<String, SyncError>;
}

/// A fixed token, never refreshed.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String, SyncError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

/// Service-account token from the metadata server.
#[derive(Debug)]
pub struct MetadataToken {
    cache: TimedCache<(), String, SyncError>,
}

impl MetadataToken {
    pub fn new(agent: ureq::Agent) -> Self {
        let cache = TimedCache::new(METADATA_TOKEN_TTL, move |_: &()| {
            let url = format!("{METADATA_BASE}/instance/service-accounts/default/token");
            let response = agent
                .get(&url)
                .set("Metadata-Flavor", "Google")
                .call()
                .map_err(|e| service_err("metadata", e))?;
            let body: MetadataTokenResponse = read_json("metadata", response)?;
            Ok(body.access_token)
        });
        Self { cache }
    }
}

impl TokenSource for MetadataToken {
    fn access_token(&self) -> Result<String, SyncError> {
        self.cache.get(&())
    }
}

/// `FLEETSYNC_ACCESS_TOKEN` when set and non-empty, otherwise the metadata
/// server.
pub fn token_source_from_env(agent: &ureq::Agent) -> Arc<dyn TokenSource> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            tracing::debug!("using access token from {TOKEN_ENV}");
            Arc::new(StaticToken::new(token.trim()))
        }
        _ => Arc::new(MetadataToken::new(agent.clone())),
    }
}

/// Project ID of the VM we are running on.
pub fn metadata_project_id(agent: &ureq::Agent) -> Result<String, SyncError> {
    let url = format!("{METADATA_BASE}/project/project-id");
    let response = agent
        .get(&url)
        .set("Metadata-Flavor", "Google")
        .call()
        .map_err(|e| service_err("metadata", e))?;
    let project = response
        .into_string()
        .map_err(|source| SyncError::Transport {
            service: "metadata",
            source,
        })?;
    let project = project.trim();
    if project.is_empty() {
        return Err(SyncError::Protocol {
            service: "metadata",
            message: "empty project id".to_owned(),
        });
    }
    Ok(project.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_is_returned_verbatim() {
        let token = StaticToken::new("ya29.test");
        assert_eq!(token.access_token().expect("token"), "ya29.test");
    }

    #[test]
    fn static_token_debug_hides_secret() {
        let token = StaticToken::new("ya29.secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
