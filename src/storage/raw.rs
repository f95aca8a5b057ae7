//! Raw String Stores
//!
//! The durable storage capability consumed by [`DurableBackend`]: a flat
//! string-to-string map bounded by a byte quota. Two implementations are
//! provided, one scoped to the process and one persisted to a JSON file.
//!
//! [`DurableBackend`]: super::DurableBackend

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{CacheError, Result};

// == Raw Store Trait ==
/// A durable key-value store of strings.
///
/// `raw_set` returns false when the write would exceed the store's quota
/// (or otherwise cannot be persisted); it never panics.
#[async_trait]
pub trait RawStore: Send + Sync {
    async fn raw_get(&self, key: &str) -> Option<String>;
    async fn raw_set(&self, key: &str, value: String) -> bool;
    async fn raw_delete(&self, key: &str);
    async fn raw_keys(&self) -> Vec<String>;
}

fn usage(map: &HashMap<String, String>) -> u64 {
    map.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
}

/// Checks whether replacing `key` with `value` keeps `map` within `quota`.
fn fits(map: &HashMap<String, String>, quota: u64, key: &str, value: &str) -> bool {
    let current = usage(map);
    let replaced = map
        .get(key)
        .map(|old| (key.len() + old.len()) as u64)
        .unwrap_or(0);
    current - replaced + (key.len() + value.len()) as u64 <= quota
}

// == Quota Store ==
/// Process-scoped string store with a byte quota.
///
/// Backs the session tier; its contents are shared by everyone holding the
/// same instance and disappear with the process.
#[derive(Debug)]
pub struct QuotaStore {
    values: RwLock<HashMap<String, String>>,
    quota_bytes: u64,
}

impl QuotaStore {
    pub fn new(quota_bytes: u64) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            quota_bytes,
        }
    }

    /// Bytes currently used (keys plus values).
    pub async fn used_bytes(&self) -> u64 {
        usage(&*self.values.read().await)
    }
}

#[async_trait]
impl RawStore for QuotaStore {
    async fn raw_get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    async fn raw_set(&self, key: &str, value: String) -> bool {
        let mut values = self.values.write().await;
        if !fits(&values, self.quota_bytes, key, &value) {
            return false;
        }
        values.insert(key.to_string(), value);
        true
    }

    async fn raw_delete(&self, key: &str) {
        self.values.write().await.remove(key);
    }

    async fn raw_keys(&self) -> Vec<String> {
        self.values.read().await.keys().cloned().collect()
    }
}

// == File Store ==
/// String store persisted as a single JSON object on disk.
///
/// Every successful write rewrites the file, so a store reopened on the same
/// path sees everything written before.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
    quota_bytes: u64,
}

impl FileStore {
    /// Opens the store at `path`, loading existing contents if the file exists.
    ///
    /// A file that is not a JSON object of strings is discarded with a
    /// warning and the store starts empty.
    pub fn open(path: impl AsRef<Path>, quota_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "discarding unreadable cache file");
                HashMap::new()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(CacheError::from(err)),
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
            quota_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, values: &HashMap<String, String>) -> Result<()> {
        let encoded = serde_json::to_string(values)?;
        tokio::fs::write(&self.path, encoded).await?;
        Ok(())
    }
}

#[async_trait]
impl RawStore for FileStore {
    async fn raw_get(&self, key: &str) -> Option<String> {
        self.values.read().await.get(key).cloned()
    }

    async fn raw_set(&self, key: &str, value: String) -> bool {
        let mut values = self.values.write().await;
        if !fits(&values, self.quota_bytes, key, &value) {
            return false;
        }

        let previous = values.insert(key.to_string(), value);
        if let Err(err) = self.flush(&values).await {
            warn!(path = %self.path.display(), error = %err, "cache file write failed");
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return false;
        }
        true
    }

    async fn raw_delete(&self, key: &str) {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            if let Err(err) = self.flush(&values).await {
                warn!(path = %self.path.display(), error = %err, "cache file write failed");
            }
        }
    }

    async fn raw_keys(&self) -> Vec<String> {
        self.values.read().await.keys().cloned().collect()
    }
}
