//! Memory Backend Module
//!
//! Bounded in-process storage combining a HashMap with insertion-order
//! tracking and TTL expiration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{current_timestamp_ms, CacheEntry, InsertionOrder, StorageBackend};

// == Memory State ==
#[derive(Debug, Default)]
struct MemoryState {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Write order used for eviction
    order: InsertionOrder,
    /// Sum of `size_bytes` over all entries
    total_size: u64,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key)?;
        self.order.remove(key);
        self.total_size = self.total_size.saturating_sub(removed.size_bytes);
        Some(removed)
    }

    fn purge_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

// == Memory Backend ==
/// In-memory storage bounded by entry count and estimated byte size.
///
/// When a write would exceed either limit, expired entries are dropped
/// first, then the oldest-written entries. Reads do not affect eviction
/// order.
#[derive(Debug)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    /// Maximum number of entries allowed
    max_items: usize,
    /// Maximum total estimated bytes allowed
    max_size_bytes: u64,
    evictions: AtomicU64,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates a new MemoryBackend with the given limits.
    ///
    /// # Arguments
    /// * `max_items` - Maximum number of entries the backend can hold
    /// * `max_size_bytes` - Maximum total estimated size of all entries
    pub fn new(max_items: usize, max_size_bytes: u64) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_items,
            max_size_bytes,
            evictions: AtomicU64::new(0),
        }
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    fn over_limit(&self, state: &MemoryState, incoming: u64) -> bool {
        state.entries.len() + 1 > self.max_items
            || state.total_size + incoming > self.max_size_bytes
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    // == Get ==
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.write().await;

        let expired = state.entries.get(key)?.is_expired();
        if expired {
            state.remove(key);
            debug!(key, "memory backend: dropped expired entry on read");
            return None;
        }

        let entry = state.entries.get_mut(key)?;
        entry.hits += 1;
        Some(entry.clone())
    }

    async fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.state.read().await.entries.get(key).cloned()
    }

    // == Set ==
    /// Stores an entry, overwriting any previous value for the key.
    ///
    /// Fails only when the entry alone is larger than the byte limit or the
    /// backend holds no entries at all (`max_items == 0`).
    async fn set(&self, key: &str, entry: CacheEntry) -> bool {
        if self.max_items == 0 || entry.size_bytes > self.max_size_bytes {
            debug!(key, size = entry.size_bytes, "memory backend: entry exceeds limits");
            return false;
        }

        let mut state = self.state.write().await;
        state.remove(key);

        if self.over_limit(&state, entry.size_bytes) {
            state.purge_expired();
        }

        while self.over_limit(&state, entry.size_bytes) {
            let Some(oldest) = state.order.pop_oldest() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                state.total_size = state.total_size.saturating_sub(evicted.size_bytes);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %oldest, "memory backend: evicted oldest entry");
            }
        }

        state.total_size += entry.size_bytes;
        state.order.record(key);
        state.entries.insert(key.to_string(), entry);
        true
    }

    // == Delete ==
    async fn delete(&self, key: &str) -> bool {
        self.state.write().await.remove(key).is_some()
    }

    async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.order.clear();
        state.total_size = 0;
    }

    async fn keys(&self) -> Vec<String> {
        self.state.read().await.entries.keys().cloned().collect()
    }

    async fn size(&self) -> u64 {
        self.state.read().await.total_size
    }

    // == Cleanup Expired ==
    async fn cleanup_expired(&self) -> usize {
        self.state.write().await.purge_expired()
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
