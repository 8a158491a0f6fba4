//! # TTL/LRU Response Cache
//!
//! In-memory cache for remote call responses with per-entry TTL expiry,
//! least-recently-used eviction under per-operation and global size caps, a
//! periodic background sweep for cold expired keys, and per-key single-flight
//! de-duplication of concurrent misses.
//!
//! All TTL math is derived from the injected clock. The store mutex guards
//! only short synchronous sections; computing a missed value never holds it.

use crate::cache::key::cache_key;
use crate::error::Result;
use crate::utils::clock::{system_clock, SharedClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cache sizing, TTL and sweep configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when neither an override nor an operation TTL matches
    pub default_ttl: Duration,

    /// Global entry cap across all operations
    pub max_cache_size: usize,

    /// Entry cap per operation name
    pub max_entries_per_operation: usize,

    /// Interval between background expiry sweeps
    pub cleanup_interval: Duration,

    /// Per-operation TTL overrides
    pub operation_ttls: HashMap<String, Duration>,

    /// Per-operation size cap overrides
    pub operation_max_entries: HashMap<String, usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            max_cache_size: 1000,
            max_entries_per_operation: 200,
            cleanup_interval: Duration::from_secs(60),
            operation_ttls: HashMap::new(),
            operation_max_entries: HashMap::new(),
        }
    }
}

impl CacheConfig {
    fn ttl_for(&self, operation: &str, ttl_override: Option<Duration>) -> Duration {
        ttl_override
            .or_else(|| self.operation_ttls.get(operation).copied())
            .unwrap_or(self.default_ttl)
    }

    fn max_entries_for(&self, operation: &str) -> usize {
        self.operation_max_entries
            .get(operation)
            .copied()
            .unwrap_or(self.max_entries_per_operation)
    }
}

/// One cached value with its expiry and access bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Operation this entry belongs to, for per-operation caps/invalidation
    pub operation: String,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub access_count: u64,
    pub last_accessed: Instant,
    /// Monotonic recency stamp; lowest = least recently used
    access_seq: u64,
}

/// Counters reported by [`ResponseCache::statistics`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub expired_removals: u64,
    pub invalidations: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.hits as f64 / lookups as f64
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    evictions: u64,
    expired_removals: u64,
    invalidations: u64,
}

/// Backing store, always accessed under the cache mutex.
#[derive(Debug)]
struct CacheStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    per_operation_counts: HashMap<String, usize>,
    counters: Counters,
    /// Monotonic counter stamped onto entries on every touch
    access_seq: u64,
}

impl<T> CacheStore<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            per_operation_counts: HashMap::new(),
            counters: Counters::default(),
            access_seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.access_seq += 1;
        self.access_seq
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        if let Some(count) = self.per_operation_counts.get_mut(&entry.operation) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.per_operation_counts.remove(&entry.operation);
            }
        }
        Some(entry)
    }

    /// Least-recently-used key, optionally restricted to one operation.
    fn lru_key(&self, operation: Option<&str>) -> Option<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| operation.map_or(true, |op| entry.operation == op))
            .min_by_key(|(_, entry)| entry.access_seq)
            .map(|(key, _)| key.clone())
    }
}

/// TTL/LRU response cache keyed by (operation, parameters, endpoint).
///
/// `T` is the cached response type; values are cloned out on hit.
pub struct ResponseCache<T> {
    config: CacheConfig,
    store: Mutex<CacheStore<T>>,
    /// Per-key in-flight computation locks for single-flight `get_or_compute`
    in_flight: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    clock: SharedClock,
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> ResponseCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        info!(
            default_ttl_secs = config.default_ttl.as_secs_f64(),
            max_cache_size = config.max_cache_size,
            cleanup_interval_secs = config.cleanup_interval.as_secs_f64(),
            "📦 Response cache initialized"
        );
        Self {
            config,
            store: Mutex::new(CacheStore::new()),
            in_flight: tokio::sync::Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached response. Hits refresh recency and access counts;
    /// entries observed expired are removed on the spot.
    pub fn get(&self, operation: &str, parameters: &Value, endpoint: Option<&str>) -> Option<T> {
        let key = cache_key(operation, parameters, endpoint);
        self.get_by_key(&key)
    }

    fn get_by_key(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut guard = self.store.lock();
        let store = &mut *guard;

        let expired = match store.entries.get(key) {
            None => {
                store.counters.misses += 1;
                return None;
            }
            Some(entry) => now >= entry.expires_at,
        };

        if expired {
            store.remove_entry(key);
            store.counters.expired_removals += 1;
            store.counters.misses += 1;
            return None;
        }

        let seq = store.next_seq();
        match store.entries.get_mut(key) {
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed = now;
                entry.access_seq = seq;
                store.counters.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                store.counters.misses += 1;
                None
            }
        }
    }

    /// Insert a response, enforcing per-operation and global size caps with
    /// LRU eviction.
    pub fn set(
        &self,
        operation: &str,
        parameters: &Value,
        value: T,
        endpoint: Option<&str>,
        ttl_override: Option<Duration>,
    ) {
        let key = cache_key(operation, parameters, endpoint);
        self.set_by_key(key, operation, value, ttl_override);
    }

    fn set_by_key(&self, key: String, operation: &str, value: T, ttl_override: Option<Duration>) {
        let ttl = self.config.ttl_for(operation, ttl_override);
        let now = self.clock.now();
        let mut store = self.store.lock();

        let replacing = store.entries.contains_key(&key);
        if !replacing {
            // Per-operation cap first, then the global cap.
            let op_cap = self.config.max_entries_for(operation);
            if store.per_operation_counts.get(operation).copied().unwrap_or(0) >= op_cap {
                if let Some(victim) = store.lru_key(Some(operation)) {
                    store.remove_entry(&victim);
                    store.counters.evictions += 1;
                    debug!(operation = %operation, "Evicted LRU entry (operation cap)");
                }
            }
            if store.entries.len() >= self.config.max_cache_size {
                if let Some(victim) = store.lru_key(None) {
                    store.remove_entry(&victim);
                    store.counters.evictions += 1;
                    debug!("Evicted LRU entry (global cap)");
                }
            }
        }

        let seq = store.next_seq();
        let previous = store.entries.insert(
            key,
            CacheEntry {
                value,
                operation: operation.to_string(),
                created_at: now,
                expires_at: now + ttl,
                access_count: 0,
                last_accessed: now,
                access_seq: seq,
            },
        );
        if previous.is_none() {
            *store
                .per_operation_counts
                .entry(operation.to_string())
                .or_insert(0) += 1;
        }
        store.counters.sets += 1;
    }

    /// Look up, and on miss compute, store and return the value.
    ///
    /// Concurrent misses for the same key share a single computation: the
    /// first caller computes while the rest wait on a per-key lock and then
    /// hit the freshly stored entry.
    pub async fn get_or_compute<F, Fut>(
        &self,
        operation: &str,
        parameters: &Value,
        endpoint: Option<&str>,
        ttl_override: Option<Duration>,
        compute: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = cache_key(operation, parameters, endpoint);

        if let Some(value) = self.get_by_key(&key) {
            return Ok(value);
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let _guard = key_lock.lock().await;

        // Another caller may have finished computing while we waited.
        if let Some(value) = self.get_by_key(&key) {
            return Ok(value);
        }

        let result = compute().await;

        if let Ok(ref value) = result {
            self.set_by_key(key.clone(), operation, value.clone(), ttl_override);
        }

        // Drop the map slot; stragglers holding the Arc re-check the cache
        // after acquiring it.
        self.in_flight.lock().await.remove(&key);

        result
    }

    /// Remove a single entry, all entries for an operation, or everything.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(
        &self,
        operation: Option<&str>,
        parameters: Option<&Value>,
        endpoint: Option<&str>,
    ) -> usize {
        let mut store = self.store.lock();
        let removed = match (operation, parameters) {
            (Some(op), Some(params)) => {
                let key = cache_key(op, params, endpoint);
                usize::from(store.remove_entry(&key).is_some())
            }
            (Some(op), None) => {
                let keys: Vec<String> = store
                    .entries
                    .iter()
                    .filter(|(_, entry)| entry.operation == op)
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &keys {
                    store.remove_entry(key);
                }
                keys.len()
            }
            (None, _) => {
                let count = store.entries.len();
                store.entries.clear();
                store.per_operation_counts.clear();
                count
            }
        };
        store.counters.invalidations += removed as u64;
        if removed > 0 {
            debug!(operation = ?operation, removed, "Cache invalidation");
        }
        removed
    }

    /// Remove every expired entry regardless of access patterns.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut store = self.store.lock();
        let expired: Vec<String> = store
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            store.remove_entry(key);
        }
        store.counters.expired_removals += expired.len() as u64;
        if !expired.is_empty() {
            debug!(removed = expired.len(), "Swept expired cache entries");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.store.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics(&self) -> CacheStatistics {
        let store = self.store.lock();
        CacheStatistics {
            entry_count: store.entries.len(),
            hits: store.counters.hits,
            misses: store.counters.misses,
            sets: store.counters.sets,
            evictions: store.counters.evictions,
            expired_removals: store.counters.expired_removals,
            invalidations: store.counters.invalidations,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ResponseCache<T> {
    /// Start the periodic background expiry sweep.
    ///
    /// The sweep runs until the returned handle is shut down, independent of
    /// request traffic, so memory stays bounded even for keys nobody reads.
    pub fn start_sweeper(self: &Arc<Self>) -> CacheSweeper {
        let cache = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval_duration = self.config.cleanup_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            // First tick fires immediately; nothing can be expired yet.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cache.sweep_expired();
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Cache sweeper shutting down");
                        break;
                    }
                }
            }
        });

        CacheSweeper {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle to the background sweep task.
pub struct CacheSweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheSweeper {
    /// Signal the sweeper to stop and wait for it, bounded.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .is_err()
        {
            warn!("Cache sweeper did not stop within join timeout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokerError;
    use crate::utils::clock::MockClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cache_with_clock(config: CacheConfig) -> (ResponseCache<String>, MockClock) {
        let clock = MockClock::new();
        let cache = ResponseCache::with_clock(config, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn entries_expire_by_ttl() {
        let (cache, clock) = cache_with_clock(CacheConfig::default());
        let params = json!({"q": 1});

        cache.set("op", &params, "value".to_string(), None, Some(Duration::from_secs(1)));
        assert_eq!(cache.get("op", &params, None), Some("value".to_string()));

        clock.advance(Duration::from_millis(1100));
        assert_eq!(cache.get("op", &params, None), None);
        // The expired entry was removed on observation.
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.statistics().expired_removals, 1);
    }

    #[test]
    fn lru_eviction_at_global_cap() {
        let config = CacheConfig {
            max_cache_size: 3,
            max_entries_per_operation: 10,
            ..CacheConfig::default()
        };
        let (cache, _clock) = cache_with_clock(config);

        for i in 0..3 {
            cache.set("op", &json!({ "k": i }), format!("v{i}"), None, None);
        }
        // Touch k=0 so k=1 becomes least recently used.
        assert!(cache.get("op", &json!({"k": 0}), None).is_some());

        cache.set("op", &json!({"k": 3}), "v3".to_string(), None, None);
        assert_eq!(cache.len(), 3);
        assert!(cache.get("op", &json!({"k": 1}), None).is_none());
        assert!(cache.get("op", &json!({"k": 0}), None).is_some());
        assert_eq!(cache.statistics().evictions, 1);
    }

    #[test]
    fn per_operation_cap_evicts_within_operation() {
        let config = CacheConfig {
            max_cache_size: 100,
            max_entries_per_operation: 2,
            ..CacheConfig::default()
        };
        let (cache, _clock) = cache_with_clock(config);

        cache.set("op_a", &json!({"k": 1}), "a1".to_string(), None, None);
        cache.set("op_a", &json!({"k": 2}), "a2".to_string(), None, None);
        cache.set("op_b", &json!({"k": 1}), "b1".to_string(), None, None);

        // Third op_a entry evicts op_a's LRU, not op_b's.
        cache.set("op_a", &json!({"k": 3}), "a3".to_string(), None, None);
        assert!(cache.get("op_a", &json!({"k": 1}), None).is_none());
        assert!(cache.get("op_b", &json!({"k": 1}), None).is_some());
    }

    #[test]
    fn operation_ttl_and_override_precedence() {
        let mut config = CacheConfig::default();
        config
            .operation_ttls
            .insert("short_op".to_string(), Duration::from_secs(2));
        let (cache, clock) = cache_with_clock(config);
        let params = json!({});

        // Operation TTL applies without an override.
        cache.set("short_op", &params, "op_ttl".to_string(), None, None);
        // Override beats the operation TTL.
        cache.set("short_op", &json!({"o": 1}), "override".to_string(), None, Some(Duration::from_secs(10)));

        clock.advance(Duration::from_secs(3));
        assert_eq!(cache.get("short_op", &params, None), None);
        assert_eq!(
            cache.get("short_op", &json!({"o": 1}), None),
            Some("override".to_string())
        );
    }

    #[test]
    fn invalidate_single_operation_and_all() {
        let (cache, _clock) = cache_with_clock(CacheConfig::default());
        cache.set("op_a", &json!({"k": 1}), "a1".to_string(), None, None);
        cache.set("op_a", &json!({"k": 2}), "a2".to_string(), None, None);
        cache.set("op_b", &json!({"k": 1}), "b1".to_string(), None, None);

        assert_eq!(cache.invalidate(Some("op_a"), Some(&json!({"k": 1})), None), 1);
        assert_eq!(cache.invalidate(Some("op_a"), None, None), 1);
        assert_eq!(cache.invalidate(None, None, None), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn sweep_removes_cold_expired_entries() {
        let (cache, clock) = cache_with_clock(CacheConfig::default());
        cache.set("op", &json!({"k": 1}), "v1".to_string(), None, Some(Duration::from_secs(1)));
        cache.set("op", &json!({"k": 2}), "v2".to_string(), None, Some(Duration::from_secs(60)));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn get_or_compute_caches_on_miss() {
        let (cache, _clock) = cache_with_clock(CacheConfig::default());
        let params = json!({"q": "menus"});
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("op", &params, None, None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("computed".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "computed");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_compute_propagates_compute_errors_without_caching() {
        let (cache, _clock) = cache_with_clock(CacheConfig::default());
        let params = json!({});

        let result = cache
            .get_or_compute("op", &params, None, None, || async {
                Err::<String, _>(InvokerError::unavailable("down"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_share_one_computation() {
        let cache = Arc::new(ResponseCache::<String>::new(CacheConfig::default()));
        let params = json!({"q": 1});
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let params = params.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("op", &params, None, None, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("shared".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_until_shutdown() {
        let clock = MockClock::new();
        let config = CacheConfig {
            cleanup_interval: Duration::from_secs(1),
            ..CacheConfig::default()
        };
        let cache = Arc::new(ResponseCache::<String>::with_clock(
            config,
            Arc::new(clock.clone()),
        ));

        cache.set("op", &json!({}), "v".to_string(), None, Some(Duration::from_secs(1)));
        let sweeper = cache.start_sweeper();

        clock.advance(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(cache.len(), 0);
        sweeper.shutdown().await;
    }
}
