//! Cached resolution of the deployed identifier set.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fleetsync_core::{Clock, DeploymentSource, SystemClock, TimedCache};

use crate::manifest::{deployed_ids, parse_manifest, Deployment, ManifestDoc};
use crate::DeployError;

/// Identifiers currently deployed in one namespace.
pub type DeployedSet = Arc<HashSet<String>>;

pub struct DeployedSetResolver {
    cache: TimedCache<String, DeployedSet, DeployError>,
}

impl DeployedSetResolver {
    /// Resolve from `sources` over `agent`, cached for `ttl`.
    pub fn new(sources: Vec<DeploymentSource>, agent: ureq::Agent, ttl: Duration) -> Self {
        Self::with_clock(sources, agent, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        sources: Vec<DeploymentSource>,
        agent: ureq::Agent,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_operation(ttl, clock, move |namespace: &String| {
            let mut deployments = Vec::new();
            for source in &sources {
                deployments.extend(read_source(&agent, source)?);
            }
            Ok(deployed_ids(&deployments, namespace))
        })
    }

    /// Cache an arbitrary resolution function.
    pub fn from_operation<F>(ttl: Duration, clock: Arc<dyn Clock>, resolve: F) -> Self
    where
        F: Fn(&String) -> Result<HashSet<String>, DeployError> + Send + Sync + 'static,
    {
        let cache = TimedCache::with_clock(ttl, clock, move |namespace: &String| {
            let ids = resolve(namespace)?;
            tracing::debug!(namespace = %namespace, count = ids.len(), "resolved deployed set");
            Ok(Arc::new(ids))
        });
        Self { cache }
    }

    pub fn resolve(&self, namespace: &str) -> Result<DeployedSet, DeployError> {
        self.cache.get(&namespace.to_owned())
    }

    pub fn refresh(&self, namespace: &str) -> Result<DeployedSet, DeployError> {
        self.cache.refresh(&namespace.to_owned())
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for DeployedSetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployedSetResolver")
            .field("ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Every deployment in one source.
pub fn read_source(
    agent: &ureq::Agent,
    source: &DeploymentSource,
) -> Result<Vec<Deployment>, DeployError> {
    match source {
        DeploymentSource::Manifest(path) => read_manifest(path),
        DeploymentSource::Registry { url, token_file } => {
            read_registry(agent, url, token_file.as_deref())
        }
    }
}

/// A missing manifest means nothing is deployed from it yet.
pub fn read_manifest(path: &Path) -> Result<Vec<Deployment>, DeployError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "deployment manifest not found; treating as empty"
            );
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(DeployError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_manifest(&text, &path.display().to_string())
}

pub fn read_registry(
    agent: &ureq::Agent,
    url: &str,
    token_file: Option<&Path>,
) -> Result<Vec<Deployment>, DeployError> {
    let mut request = agent.get(url);
    if let Some(token_file) = token_file {
        let token = std::fs::read_to_string(token_file).map_err(|source| DeployError::Io {
            path: token_file.to_path_buf(),
            source,
        })?;
        request = request.set("Authorization", &format!("Bearer {}", token.trim()));
    }
    let response = request.call().map_err(|source| DeployError::Registry {
        url: url.to_owned(),
        source: Box::new(source),
    })?;
    let doc: ManifestDoc = response.into_json().map_err(|e| DeployError::Parse {
        origin: url.to_owned(),
        message: e.to_string(),
    })?;
    Ok(doc.into_deployments())
}
