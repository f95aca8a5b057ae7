//! Cache Manager Module
//!
//! Typed get/set over a storage backend, adding default TTLs, statistics,
//! pattern invalidation and a get-or-compute helper.

use std::future::Future;

use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::stats::{CacheStats, Counters};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::storage::{Backend, CacheEntry, StorageBackend};

// == Cache Manager ==
/// Typed cache over one [`Backend`].
///
/// Every instance owns its backend; build one per consumer (or per test)
/// and share it through an `Arc`.
pub struct CacheManager {
    backend: Backend,
    /// Default TTL in milliseconds for writes without explicit TTL
    default_ttl_ms: u64,
    counters: Counters,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a new CacheManager on `backend`.
    ///
    /// # Arguments
    /// * `backend` - Storage the manager reads and writes
    /// * `default_ttl_ms` - TTL applied when `set` is called without one
    pub fn new(backend: Backend, default_ttl_ms: u64) -> Self {
        Self {
            backend,
            default_ttl_ms,
            counters: Counters::default(),
        }
    }

    /// Creates a CacheManager with the backend and TTL from `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self::new(Backend::from_config(config)?, config.ttl_ms))
    }

    pub fn default_ttl_ms(&self) -> u64 {
        self.default_ttl_ms
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    // == Get ==
    /// Returns the live value for `key`, or None.
    ///
    /// None covers "never set", "expired" and "stored value does not decode
    /// as `T`"; each counts as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(entry) = self.backend.get(key).await else {
            self.counters.record_miss();
            debug!(key, "cache miss");
            return None;
        };

        match serde_json::from_value(entry.data) {
            Ok(value) => {
                self.counters.record_hit();
                debug!(key, "cache hit");
                Some(value)
            }
            Err(err) => {
                self.counters.record_miss();
                debug!(key, error = %err, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Returns the stored value for `key` even if it has expired.
    ///
    /// Does not touch statistics and does not delete anything. Used for
    /// serving stale data after a network failure.
    pub async fn peek_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.backend.peek(key).await?;
        serde_json::from_value(entry.data).ok()
    }

    // == Set ==
    /// Stores `data` under `key`.
    ///
    /// `ttl_ms` defaults to the manager's default TTL. A TTL of zero means
    /// "do not cache": nothing is written and false is returned. Returns
    /// false as well when the backend rejects the write (quota, size).
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, ttl_ms: Option<u64>) -> bool {
        let ttl_ms = ttl_ms.unwrap_or(self.default_ttl_ms);
        if ttl_ms == 0 {
            debug!(key, "ttl is zero, skipping cache write");
            return false;
        }

        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "value not serializable, skipping cache write");
                return false;
            }
        };

        self.backend.set(key, CacheEntry::new(key, value, ttl_ms)).await
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> bool {
        self.backend.delete(key).await
    }

    pub async fn clear(&self) {
        self.backend.clear().await
    }

    // == Has ==
    /// Returns true if `key` holds a live value.
    ///
    /// Implemented as `get(key).is_some()`, so every call is counted as a
    /// hit or a miss in [`CacheManager::stats`].
    pub async fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).await.is_some()
    }

    // == Get Or Set ==
    /// Returns the cached value for `key`, computing and storing it with the
    /// default TTL on a miss.
    ///
    /// There is no coordination between callers: two tasks that miss on the
    /// same key at the same time both run `fallback`. When `fallback` is a
    /// network call, route it through a [`Deduplicator`] to collapse them.
    ///
    /// [`Deduplicator`]: crate::request::Deduplicator
    pub async fn get_or_set<T, F, Fut>(&self, key: &str, fallback: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = fallback().await?;
        self.set(key, &value, None).await;
        Ok(value)
    }

    // == Invalidate Pattern ==
    /// Deletes every key matching `pattern` and returns how many were removed.
    ///
    /// Scans all keys, so cost is linear in the number of entries.
    pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut removed = 0;
        for key in self.backend.keys().await {
            if pattern.is_match(&key) && self.backend.delete(&key).await {
                removed += 1;
            }
        }
        debug!(pattern = pattern.as_str(), removed, "invalidated keys");
        removed
    }

    pub async fn keys(&self) -> Vec<String> {
        self.backend.keys().await
    }

    // == Cleanup Expired ==
    /// Removes every expired entry from the backend.
    pub async fn cleanup_expired(&self) -> usize {
        self.backend.cleanup_expired().await
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let hits = self.counters.hits();
        let misses = self.counters.misses();

        CacheStats {
            hits,
            misses,
            evictions: self.backend.evictions(),
            item_count: self.backend.keys().await.len(),
            size_bytes: self.backend.size().await,
            hit_rate: CacheStats::compute_hit_rate(hits, misses),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::storage::MemoryBackend;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn manager() -> CacheManager {
        CacheManager::new(Backend::Memory(MemoryBackend::new(100, 1 << 20)), 60_000)
    }

    #[tokio::test]
    async fn test_set_and_get_typed() {
        let cache = manager();

        assert!(cache.set("categories", &json!([{"id": 1, "name": "Tech"}]), None).await);
        let value: serde_json::Value = cache.get("categories").await.unwrap();

        assert_eq!(value[0]["name"], "Tech");
    }

    #[tokio::test]
    async fn test_get_wrong_type_is_miss() {
        let cache = manager();
        cache.set("n", &"not a number", None).await;

        assert_eq!(cache.get::<u32>("n").await, None);
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_bypasses_storage() {
        let cache = manager();

        assert!(!cache.set("k", &1, Some(0)).await);
        assert!(cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_get_and_has_return_absent() {
        let cache = manager();
        cache.set("k", &"v", Some(20)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get::<String>("k").await, None);
        assert!(!cache.has("k").await);
    }

    #[tokio::test]
    async fn test_has_counts_toward_stats() {
        let cache = manager();
        cache.set("present", &1, None).await;

        assert!(cache.has("present").await);
        assert!(!cache.has("absent").await);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[tokio::test]
    async fn test_stats_before_any_access() {
        let stats = manager().stats().await;
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.item_count, 0);
        assert_eq!(stats.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_stats_item_count_and_size() {
        let cache = manager();
        cache.set("a", &1, None).await;
        cache.set("b", &2, None).await;

        let stats = cache.stats().await;
        assert_eq!(stats.item_count, 2);
        assert!(stats.size_bytes > 0);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let cache = manager();
        cache.set("user:1", &1, None).await;
        cache.set("user:2", &2, None).await;
        cache.set("post:1", &3, None).await;

        let removed = cache.invalidate_pattern(&Regex::new("^user:").unwrap()).await;

        assert_eq!(removed, 2);
        assert_eq!(cache.keys().await, vec!["post:1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_or_set_computes_once_sequentially() {
        let cache = manager();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: u32 = cache
                .get_or_set("answer", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_set_error_is_not_cached() {
        let cache = manager();

        let result: Result<u32> = cache
            .get_or_set("k", || async { Err(CacheError::network("down")) })
            .await;

        assert!(result.is_err());
        assert!(!cache.has("k").await);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_set_may_run_fallback_twice() {
        let cache = Arc::new(manager());
        let calls = Arc::new(AtomicUsize::new(0));

        let run = |cache: Arc<CacheManager>, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_set("slow", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, CacheError>(7u32)
                })
                .await
        };

        let (a, b) = tokio::join!(
            run(cache.clone(), calls.clone()),
            run(cache.clone(), calls.clone())
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        // Both callers missed before either stored a value
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_peek_stale_ignores_expiry_and_stats() {
        let cache = manager();
        cache.set("k", &"old", Some(10)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.peek_stale::<String>("k").await, Some("old".to_string()));
        let stats = cache.stats().await;
        assert_eq!(stats.hits + stats.misses, 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = manager();
        cache.set("a", &1, None).await;
        cache.set("b", &2, None).await;

        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);

        cache.clear().await;
        assert!(cache.keys().await.is_empty());
    }
}
