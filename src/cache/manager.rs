//! In-memory query cache
//!
//! Provides a `QueryCache` that keeps fetched values with an expiry deadline
//! and deduplicates concurrent loads of the same key: while a load is in
//! flight, every caller asking for that key awaits the same shared future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use tokio::time::Instant;

use crate::data::{FetchError, ViewMode};

/// Freshness window of forecasts and bulletins
pub const REPORT_TTL: Duration = Duration::from_secs(60 * 60);

/// Freshness window of the municipality master list
pub const MUNICIPALITIES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Identifies one cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Report for a (view mode, location id) pair
    Report { mode: ViewMode, location_id: String },
    /// Municipality master list
    Municipalities,
}

impl QueryKey {
    pub fn report(mode: ViewMode, location_id: impl Into<String>) -> Self {
        QueryKey::Report {
            mode,
            location_id: location_id.into(),
        }
    }

    /// How long a value stays fresh
    pub fn ttl(&self) -> Duration {
        match self {
            QueryKey::Report { .. } => REPORT_TTL,
            QueryKey::Municipalities => MUNICIPALITIES_TTL,
        }
    }
}

/// A cached value with its freshness deadline
#[derive(Debug)]
struct CacheEntry<T> {
    /// The cached data
    data: Arc<T>,
    /// When the data was cached
    cached_at: DateTime<Local>,
    /// When the entry stops being fresh
    expires_at: Instant,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: Arc<T>,
    /// When the data was originally cached
    pub cached_at: DateTime<Local>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<T>, FetchError>>>;

/// Keyed cache with TTLs and in-flight deduplication
///
/// Only successful results are cached. A load whose in-flight slot was
/// cancelled or replaced while it ran never writes its result.
pub struct QueryCache<T> {
    entries: Mutex<HashMap<QueryKey, CacheEntry<T>>>,
    in_flight: Mutex<HashMap<QueryKey, SharedFetch<T>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> std::fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &lock(&self.entries).len())
            .field("in_flight", &lock(&self.in_flight).len())
            .finish()
    }
}

/// Entries stay usable after a panic in another holder of the lock
fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads an entry, fresh or not
    ///
    /// # Returns
    /// * `Some(CachedData<T>)` with `is_expired` set once the TTL has passed
    /// * `None` if nothing is cached for the key
    pub fn read(&self, key: &QueryKey) -> Option<CachedData<T>> {
        let entries = lock(&self.entries);
        let entry = entries.get(key)?;
        Some(CachedData {
            data: Arc::clone(&entry.data),
            cached_at: entry.cached_at,
            is_expired: Instant::now() >= entry.expires_at,
        })
    }

    /// Stores a value with the key's TTL
    pub fn write(&self, key: QueryKey, data: Arc<T>) {
        let expires_at = Instant::now() + key.ttl();
        lock(&self.entries).insert(
            key,
            CacheEntry {
                data,
                cached_at: Local::now(),
                expires_at,
            },
        );
    }

    /// Drops the cached value so the next request refetches
    pub fn invalidate(&self, key: &QueryKey) {
        lock(&self.entries).remove(key);
    }

    /// Forgets the in-flight load for a key
    ///
    /// The load itself stops once every caller awaiting it has gone away.
    pub fn cancel(&self, key: &QueryKey) {
        if lock(&self.in_flight).remove(key).is_some() {
            debug!("cancelled in-flight load for {:?}", key);
        }
    }

    /// Whether a load for the key is currently in flight
    pub fn is_in_flight(&self, key: &QueryKey) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    /// Returns the fresh cached value or loads it
    ///
    /// If a load for the same key is already in flight, its result is
    /// awaited instead of calling `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        if let Some(cached) = self.read(&key).filter(|c| !c.is_expired) {
            debug!("cache hit for {:?}", key);
            return Ok(cached.data);
        }

        let shared = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(&key) {
                Some(pending) => {
                    debug!("reusing in-flight load for {:?}", key);
                    pending.clone()
                }
                None => {
                    debug!("cache miss for {:?}", key);
                    let pending = fetch().map(|result| result.map(Arc::new)).boxed().shared();
                    in_flight.insert(key.clone(), pending.clone());
                    pending
                }
            }
        };

        let result = shared.clone().await;

        let still_current = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(&key) {
                Some(pending) if pending.ptr_eq(&shared) => {
                    in_flight.remove(&key);
                    true
                }
                _ => false,
            }
        };

        if still_current {
            if let Ok(data) = &result {
                self.write(key, Arc::clone(data));
            }
        }

        result
    }
}
