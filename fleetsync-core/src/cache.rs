//! Time-bounded memoization of an expensive operation.
//!
//! [`TimedCache`] wraps a plain `Fn(&K) -> Result<V, E>` and remembers each
//! successful result for a fixed TTL. A single mutex guards the whole map and
//! is held while the operation runs, so at most one computation is in flight
//! per cache, whatever the key. Call volume is low (TTLs of seconds to hours),
//! so the coarse lock is what keeps the upstream from being hit twice.
//!
//! Only the key reaches the operation. Anything that should vary the result
//! has to be folded into `K`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. For tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// TimedCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// `None` when `now + ttl` is past what `Instant` can hold.
    expiration: Option<Instant>,
    value: V,
}

type Operation<K, V, E> = Box<dyn Fn(&K) -> Result<V, E> + Send + Sync>;

/// TTL-bounded memoization with one lock for all keys.
pub struct TimedCache<K, V, E> {
    ttl: Duration,
    operation: Operation<K, V, E>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V, E> TimedCache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache `operation` results for `ttl` using the system clock.
    pub fn new<F>(ttl: Duration, operation: F) -> Self
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_clock(ttl, Arc::new(SystemClock), operation)
    }

    pub fn with_clock<F>(ttl: Duration, clock: Arc<dyn Clock>, operation: F) -> Self
    where
        F: Fn(&K) -> Result<V, E> + Send + Sync + 'static,
    {
        Self {
            ttl,
            operation: Box::new(operation),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`, recomputing when absent or expired.
    pub fn get(&self, key: &K) -> Result<V, E> {
        self.fetch(key, false)
    }

    /// Recompute `key` unconditionally and store the fresh value.
    pub fn refresh(&self, key: &K) -> Result<V, E> {
        self.fetch(key, true)
    }

    /// Shared implementation of [`get`](Self::get) and
    /// [`refresh`](Self::refresh).
    ///
    /// On error nothing is stored; an older expired entry, if any, stays in
    /// place and is retried by the next call.
    pub fn fetch(&self, key: &K, force_refresh: bool) -> Result<V, E> {
        let mut entries = self.lock();
        let now = self.clock.now();

        if !force_refresh {
            if let Some(entry) = entries.get(key) {
                if entry.expiration.map_or(true, |expiration| expiration >= now) {
                    return Ok(entry.value.clone());
                }
            }
        }

        let value = (self.operation)(key)?;
        entries.insert(
            key.clone(),
            CacheEntry {
                expiration: now.checked_add(self.ttl),
                value: value.clone(),
            },
        );
        Ok(value)
    }

    /// Drop every entry. Intended for deterministic test setup.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V, E> std::fmt::Debug for TimedCache<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
