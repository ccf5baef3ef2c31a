//! Reading status records and caching the fleet snapshot.
//!
//! [`StatusStore`] is the seam to the upstream key-value store. Production
//! uses [`crate::datastore::DatastoreStore`]; local runs and tests point
//! [`JsonFileStore`] at a file. [`FleetData`] sits on top and memoizes one
//! snapshot per namespace for a short TTL, so the sync loop, the web
//! handlers and the metrics collector share a single upstream fetch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fleetsync_core::{Clock, StatusRecord, SystemClock, TimedCache};

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// StatusStore
// ---------------------------------------------------------------------------

/// Source of every status record in a namespace.
pub trait StatusStore: Send + Sync {
    fn fetch_statuses(&self, namespace: &str) -> Result<Vec<StatusRecord>, SyncError>;
}

impl<T: StatusStore + ?Sized> StatusStore for Arc<T> {
    fn fetch_statuses(&self, namespace: &str) -> Result<Vec<StatusRecord>, SyncError> {
        (**self).fetch_statuses(namespace)
    }
}

/// Records loaded from a JSON array of objects keyed by the canonical field
/// names. The file is re-read on every fetch. The namespace is ignored.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusStore for JsonFileStore {
    fn fetch_statuses(&self, _namespace: &str) -> Result<Vec<StatusRecord>, SyncError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        let records: Vec<StatusRecord> = serde_json::from_str(&contents)?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "loaded status file");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// FleetData
// ---------------------------------------------------------------------------

/// Shared, immutable view of one fetch.
pub type FleetSnapshot = Arc<Vec<StatusRecord>>;

/// Namespace-keyed cache of the full record set.
#[derive(Debug)]
pub struct FleetData {
    cache: TimedCache<String, FleetSnapshot, SyncError>,
}

impl FleetData {
    /// Cache `store` reads for `ttl`.
    pub fn new(ttl: Duration, store: Arc<dyn StatusStore>) -> Self {
        Self::from_operation(ttl, Arc::new(SystemClock), move |namespace: &String| {
            store.fetch_statuses(namespace)
        })
    }

    /// Cache an arbitrary fetch operation. Callers use this to wrap the store
    /// read with timing or other instrumentation.
    pub fn from_operation<F>(ttl: Duration, clock: Arc<dyn Clock>, fetch: F) -> Self
    where
        F: Fn(&String) -> Result<Vec<StatusRecord>, SyncError> + Send + Sync + 'static,
    {
        let cache = TimedCache::with_clock(ttl, clock, move |namespace: &String| {
            fetch(namespace).map(Arc::new)
        });
        Self { cache }
    }

    /// The cached snapshot for `namespace`.
    pub fn get(&self, namespace: &str) -> Result<FleetSnapshot, SyncError> {
        self.cache.get(&namespace.to_owned())
    }

    /// Bypass the TTL and re-read the store.
    pub fn refresh(&self, namespace: &str) -> Result<FleetSnapshot, SyncError> {
        self.cache.refresh(&namespace.to_owned())
    }

    /// Records whose identifier contains `fragment`. An empty fragment
    /// matches everything.
    pub fn matching(
        &self,
        namespace: &str,
        fragment: &str,
    ) -> Result<Vec<StatusRecord>, SyncError> {
        let snapshot = self.get(namespace)?;
        Ok(filter_by_id(&snapshot, fragment))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Substring filter on the identifier.
pub fn filter_by_id(records: &[StatusRecord], fragment: &str) -> Vec<StatusRecord> {
    records
        .iter()
        .filter(|record| record.id().contains(fragment))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
