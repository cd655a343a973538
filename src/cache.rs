//! Caching infrastructure for remote lookup documents
//!
//! This module provides the time-to-live primitives behind the manifest and
//! shard caches. Both follow the same get-or-refresh contract: a fresh entry is
//! returned without I/O, anything else runs the supplied fetch function and
//! installs its result in one step.
//!
//! ## Cache Types
//!
//! - **TtlCell**: a single cached value (the manifest)
//! - **TtlMap**: independently refreshed values keyed by id (the shards)
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use record_lookup_bot::cache::TtlCell;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let cell: TtlCell<String> = TtlCell::new("greeting", Duration::from_secs(600));
//! let value = cell
//!     .get_or_refresh(|| async { Ok::<_, std::io::Error>("hello".to_string()) })
//!     .await?;
//! assert_eq!(value.as_str(), "hello");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// A cached value together with the moment it was fetched
#[derive(Debug)]
pub struct CacheEntry<T> {
    /// The cached value, shared with every reader that received it
    pub value: Arc<T>,
    /// When this entry was installed
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry stamped with the current time
    pub fn new(value: Arc<T>) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    /// Age of this entry
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    /// An entry is fresh while its age is strictly below the TTL
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently held (including in-flight refreshes)
    pub entries: usize,
    /// Number of requests served from a fresh entry
    pub hits: u64,
    /// Number of requests that required a fetch
    pub misses: u64,
    /// Number of fetches whose result was installed
    pub refreshes: u64,
    /// Number of fetches that failed
    pub failures: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Wall-clock time of the last installed refresh
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl CacheStats {
    fn record_hit(&mut self, cache: &'static str) {
        self.hits += 1;
        crate::observability::metrics::record_cache_request(cache, true);
    }

    fn record_miss(&mut self, cache: &'static str) {
        self.misses += 1;
        crate::observability::metrics::record_cache_request(cache, false);
    }

    fn record_refresh(&mut self, cache: &'static str, installed: bool) {
        if installed {
            self.refreshes += 1;
            self.last_refreshed = Some(Utc::now());
        }
        crate::observability::metrics::record_cache_refresh(cache, true);
    }

    fn record_failure(&mut self, cache: &'static str) {
        self.failures += 1;
        crate::observability::metrics::record_cache_refresh(cache, false);
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        let mut stats = self.clone();
        stats.entries = entries;
        let total_requests = stats.hits + stats.misses;
        if total_requests > 0 {
            stats.hit_rate = stats.hits as f64 / total_requests as f64;
        }
        stats
    }
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// A single value refreshed on expiry
///
/// The entry is guarded by an async mutex held for the whole
/// check-fetch-install sequence, so concurrent callers that miss together
/// share one fetch.
pub struct TtlCell<V> {
    name: &'static str,
    ttl: Duration,
    slot: Mutex<Option<CacheEntry<V>>>,
    stats: parking_lot::Mutex<CacheStats>,
}

impl<V> TtlCell<V> {
    /// Create an empty cell; `name` labels logs and metrics
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slot: Mutex::new(None),
            stats: parking_lot::Mutex::new(CacheStats::default()),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value if fresh, otherwise fetch and install a new one.
    ///
    /// A failed fetch installs nothing: the previous entry (stale or absent)
    /// stays in place and the error is returned to the caller.
    pub async fn get_or_refresh<F, Fut, E>(&self, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(self.ttl) {
                self.stats.lock().record_hit(self.name);
                return Ok(Arc::clone(&entry.value));
            }
        }

        self.stats.lock().record_miss(self.name);
        tracing::debug!(cache = self.name, "Cache miss, fetching");

        match fetch().await {
            Ok(value) => {
                let value = Arc::new(value);
                *slot = Some(CacheEntry::new(Arc::clone(&value)));
                self.stats.lock().record_refresh(self.name, true);
                Ok(value)
            }
            Err(e) => {
                self.stats.lock().record_failure(self.name);
                Err(e)
            }
        }
    }

    /// Drop the cached value so the next call refetches
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = match self.slot.try_lock() {
            Ok(slot) => usize::from(slot.is_some()),
            // Locked means a refresh is in flight
            Err(_) => 1,
        };
        self.stats.lock().snapshot(entries)
    }
}

/// Independently refreshed values keyed by id
///
/// Every key owns its own async slot. The key table itself sits behind a
/// short synchronous lock that is never held across an await, so a slow
/// fetch for one key does not delay lookups of other keys.
pub struct TtlMap<K, V> {
    name: &'static str,
    ttl: Duration,
    slots: parking_lot::Mutex<HashMap<K, Slot<V>>>,
    stats: parking_lot::Mutex<CacheStats>,
}

impl<K, V> TtlMap<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    /// Create an empty map; `name` labels logs and metrics
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            slots: parking_lot::Mutex::new(HashMap::new()),
            stats: parking_lot::Mutex::new(CacheStats::default()),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock();
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    /// Remove the slot for `key` if it is empty and nobody else is using it
    fn prune(&self, key: &K) {
        let mut slots = self.slots.lock();
        let removable = match slots.get(key) {
            Some(slot) if Arc::strong_count(slot) == 1 => {
                slot.try_lock().map(|entry| entry.is_none()).unwrap_or(false)
            }
            _ => false,
        };
        if removable {
            slots.remove(key);
        }
    }

    /// Return the cached value for `key` if fresh, otherwise fetch it.
    ///
    /// `fetch` returns `Ok(None)` when the key does not exist upstream. That
    /// negative result is not cached and any stale entry for the key is
    /// dropped. A failed fetch leaves the previous entry untouched.
    pub async fn get_or_refresh<F, Fut, E>(&self, key: &K, fetch: F) -> Result<Option<Arc<V>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>, E>>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(self.ttl) {
                self.stats.lock().record_hit(self.name);
                return Ok(Some(Arc::clone(&cached.value)));
            }
        }

        self.stats.lock().record_miss(self.name);
        tracing::debug!(cache = self.name, key = ?key, "Cache miss, fetching");

        let result = match fetch().await {
            Ok(Some(value)) => {
                let value = Arc::new(value);
                *entry = Some(CacheEntry::new(Arc::clone(&value)));
                self.stats.lock().record_refresh(self.name, true);
                Ok(Some(value))
            }
            Ok(None) => {
                *entry = None;
                self.stats.lock().record_refresh(self.name, false);
                Ok(None)
            }
            Err(e) => {
                self.stats.lock().record_failure(self.name);
                Err(e)
            }
        };

        let now_empty = entry.is_none();
        drop(entry);
        drop(slot);
        if now_empty {
            self.prune(key);
        }

        result
    }

    /// Number of keys with a slot (populated or being refreshed)
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Drop every entry whose age has reached the TTL
    pub fn cleanup(&self) {
        let mut slots = self.slots.lock();
        let initial_len = slots.len();

        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry
                .as_ref()
                .map(|cached| cached.is_fresh(self.ttl))
                .unwrap_or(false),
            // Locked slots are mid-refresh
            Err(_) => true,
        });

        let removed = initial_len - slots.len();
        if removed > 0 {
            tracing::debug!(cache = self.name, "Cache cleanup removed {} expired entries", removed);
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.len();
        self.stats.lock().snapshot(entries)
    }
}
