//! Storage Module
//!
//! Pluggable key-value backends behind one `StorageBackend` interface:
//! a bounded in-memory map, and a durable backend layered over a raw
//! string store (session-scoped or file-backed).
//!
//! The concrete backend is chosen once at construction from
//! [`StorageType`] and wrapped in the [`Backend`] enum, which dispatches
//! by `match` rather than through a trait object.

mod durable;
mod entry;
mod memory;
mod order;
mod raw;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CacheConfig, StorageType};
use crate::error::Result;

pub use durable::DurableBackend;
pub use entry::{current_timestamp_ms, estimate_size, CacheEntry};
pub use memory::MemoryBackend;
pub use order::InsertionOrder;
pub use raw::{FileStore, QuotaStore, RawStore};

// == Storage Backend Trait ==
/// Uniform contract shared by every backend.
///
/// `get` treats expired entries as absent and deletes them as a side
/// effect. `set` reports failure through its return value; backends never
/// panic or error on a full store.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Returns the live entry for `key`, removing it if expired.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Returns the entry for `key` even when expired, without side effects.
    async fn peek(&self, key: &str) -> Option<CacheEntry>;

    /// Stores `entry` under `key`, evicting as needed. Returns false when the
    /// entry could not be stored.
    async fn set(&self, key: &str, entry: CacheEntry) -> bool;

    /// Removes `key`; returns whether it existed.
    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self);

    async fn keys(&self) -> Vec<String>;

    /// Total estimated bytes currently stored.
    async fn size(&self) -> u64;

    /// Removes every expired entry and returns how many were removed.
    async fn cleanup_expired(&self) -> usize;

    /// Entries dropped to satisfy capacity limits so far.
    fn evictions(&self) -> u64 {
        0
    }

    fn name(&self) -> &'static str;
}

// == Backend ==
/// The backend a cache instance runs on.
pub enum Backend {
    Memory(MemoryBackend),
    Durable(DurableBackend),
}

impl Backend {
    /// Builds the backend selected by `config.storage_type`.
    ///
    /// The local tier opens (or creates) `config.file_path`.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend = match config.storage_type {
            StorageType::Memory => {
                Backend::Memory(MemoryBackend::new(config.max_items, config.max_size_bytes))
            }
            StorageType::Session => Backend::Durable(DurableBackend::new(
                Arc::new(QuotaStore::new(config.quota_bytes)),
                config.namespace.clone(),
            )),
            StorageType::Local => Backend::Durable(DurableBackend::new(
                Arc::new(FileStore::open(&config.file_path, config.quota_bytes)?),
                config.namespace.clone(),
            )),
        };
        Ok(backend)
    }

    /// Durable backend over a caller-supplied raw store.
    pub fn durable(raw: Arc<dyn RawStore>, namespace: impl Into<String>) -> Self {
        Backend::Durable(DurableBackend::new(raw, namespace))
    }
}

#[async_trait]
impl StorageBackend for Backend {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self {
            Backend::Memory(b) => b.get(key).await,
            Backend::Durable(b) => b.get(key).await,
        }
    }

    async fn peek(&self, key: &str) -> Option<CacheEntry> {
        match self {
            Backend::Memory(b) => b.peek(key).await,
            Backend::Durable(b) => b.peek(key).await,
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> bool {
        match self {
            Backend::Memory(b) => b.set(key, entry).await,
            Backend::Durable(b) => b.set(key, entry).await,
        }
    }

    async fn delete(&self, key: &str) -> bool {
        match self {
            Backend::Memory(b) => b.delete(key).await,
            Backend::Durable(b) => b.delete(key).await,
        }
    }

    async fn clear(&self) {
        match self {
            Backend::Memory(b) => b.clear().await,
            Backend::Durable(b) => b.clear().await,
        }
    }

    async fn keys(&self) -> Vec<String> {
        match self {
            Backend::Memory(b) => b.keys().await,
            Backend::Durable(b) => b.keys().await,
        }
    }

    async fn size(&self) -> u64 {
        match self {
            Backend::Memory(b) => b.size().await,
            Backend::Durable(b) => b.size().await,
        }
    }

    async fn cleanup_expired(&self) -> usize {
        match self {
            Backend::Memory(b) => b.cleanup_expired().await,
            Backend::Durable(b) => b.cleanup_expired().await,
        }
    }

    fn evictions(&self) -> u64 {
        match self {
            Backend::Memory(b) => b.evictions(),
            Backend::Durable(b) => b.evictions(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Memory(b) => b.name(),
            Backend::Durable(b) => b.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_config_selects_backend() {
        let memory = Backend::from_config(&CacheConfig::default()).unwrap();
        assert_eq!(memory.name(), "memory");

        let session = Backend::from_config(
            &CacheConfig::default().with_storage_type(StorageType::Session),
        )
        .unwrap();
        assert_eq!(session.name(), "durable");
    }

    #[tokio::test]
    async fn test_local_backend_uses_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CacheConfig::default().with_storage_type(StorageType::Local);
        config.file_path = dir.path().join("cache.json");

        let backend = Backend::from_config(&config).unwrap();
        assert!(backend.set("k", CacheEntry::new("k", json!(1), 60_000)).await);
        assert!(config.file_path.exists());
    }
}
