//! Durable Backend Module
//!
//! Stores JSON-encoded [`CacheEntry`] values in a shared [`RawStore`] under a
//! key namespace.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{current_timestamp_ms, CacheEntry, RawStore, StorageBackend};

// == Durable Backend ==
/// Backend over a raw string store that may be shared with other consumers.
///
/// Only keys under `namespace` belong to this backend; everything else in
/// the raw store is left alone. Writes are last-writer-wins.
///
/// Hit counts are not written back on reads, so `hits` on entries returned
/// from this backend stays at its stored value.
pub struct DurableBackend {
    raw: Arc<dyn RawStore>,
    namespace: String,
}

/// Outcome of decoding one raw value.
enum Decoded {
    Live(CacheEntry),
    Expired(CacheEntry),
    Corrupt,
}

impl DurableBackend {
    pub fn new(raw: Arc<dyn RawStore>, namespace: impl Into<String>) -> Self {
        Self {
            raw,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn raw_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    async fn load(&self, raw_key: &str, now: u64) -> Option<Decoded> {
        let raw = self.raw.raw_get(raw_key).await?;
        let decoded = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.is_expired_at(now) => Decoded::Expired(entry),
            Ok(entry) => Decoded::Live(entry),
            Err(err) => {
                warn!(key = raw_key, error = %err, "durable backend: dropping corrupt entry");
                Decoded::Corrupt
            }
        };
        Some(decoded)
    }

    async fn own_raw_keys(&self) -> Vec<String> {
        self.raw
            .raw_keys()
            .await
            .into_iter()
            .filter(|k| k.starts_with(&self.namespace))
            .collect()
    }
}

#[async_trait]
impl StorageBackend for DurableBackend {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let raw_key = self.raw_key(key);
        match self.load(&raw_key, current_timestamp_ms()).await? {
            Decoded::Live(entry) => Some(entry),
            Decoded::Expired(_) | Decoded::Corrupt => {
                self.raw.raw_delete(&raw_key).await;
                None
            }
        }
    }

    async fn peek(&self, key: &str) -> Option<CacheEntry> {
        let raw_key = self.raw_key(key);
        match self.load(&raw_key, current_timestamp_ms()).await? {
            Decoded::Live(entry) | Decoded::Expired(entry) => Some(entry),
            Decoded::Corrupt => {
                self.raw.raw_delete(&raw_key).await;
                None
            }
        }
    }

    // == Set ==
    /// Writes the entry; on a rejected write, sweeps expired entries and
    /// retries exactly once.
    async fn set(&self, key: &str, entry: CacheEntry) -> bool {
        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "durable backend: entry not serializable");
                return false;
            }
        };

        let raw_key = self.raw_key(key);
        if self.raw.raw_set(&raw_key, encoded.clone()).await {
            return true;
        }

        let removed = self.cleanup_expired().await;
        debug!(key, removed, "durable backend: write rejected, retrying after cleanup");

        if self.raw.raw_set(&raw_key, encoded).await {
            return true;
        }

        warn!(key, "durable backend: storage quota exceeded, entry not persisted");
        false
    }

    async fn delete(&self, key: &str) -> bool {
        let raw_key = self.raw_key(key);
        let existed = self.raw.raw_get(&raw_key).await.is_some();
        if existed {
            self.raw.raw_delete(&raw_key).await;
        }
        existed
    }

    async fn clear(&self) {
        for raw_key in self.own_raw_keys().await {
            self.raw.raw_delete(&raw_key).await;
        }
    }

    async fn keys(&self) -> Vec<String> {
        self.own_raw_keys()
            .await
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string))
            .collect()
    }

    async fn size(&self) -> u64 {
        let mut total = 0;
        for raw_key in self.own_raw_keys().await {
            if let Some(raw) = self.raw.raw_get(&raw_key).await {
                total += raw.len() as u64;
            }
        }
        total
    }

    // == Cleanup Expired ==
    /// Removes expired and corrupt entries under this namespace.
    async fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for raw_key in self.own_raw_keys().await {
            if let Some(Decoded::Expired(_) | Decoded::Corrupt) = self.load(&raw_key, now).await {
                self.raw.raw_delete(&raw_key).await;
                removed += 1;
            }
        }
        removed
    }

    fn name(&self) -> &'static str {
        "durable"
    }
}
