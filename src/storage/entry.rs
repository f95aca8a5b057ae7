//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
///
/// The serialized form is `{data, timestamp, ttl, key, size?, hits?}` so
/// that it round-trips through the string storage of durable backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Key the entry was stored under
    pub key: String,
    /// The stored payload
    pub data: Value,
    /// Creation timestamp (Unix milliseconds), never mutated after write
    #[serde(rename = "timestamp")]
    pub created_at: u64,
    /// Lifetime in milliseconds
    #[serde(rename = "ttl")]
    pub ttl_ms: u64,
    /// Estimated serialized size, used for eviction accounting only
    #[serde(rename = "size", default)]
    pub size_bytes: u64,
    /// Number of reads served from this entry
    #[serde(default)]
    pub hits: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `data` - The payload to store
    /// * `ttl_ms` - Lifetime in milliseconds
    pub fn new(key: impl Into<String>, data: Value, ttl_ms: u64) -> Self {
        let key = key.into();
        let size_bytes = estimate_size(&key, &data);

        Self {
            key,
            data,
            created_at: current_timestamp_ms(),
            ttl_ms,
            size_bytes,
            hits: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once strictly more than `ttl_ms` milliseconds
    /// have passed since it was written.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at) > self.ttl_ms
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds; `0` once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        let expires_at = self.created_at.saturating_add(self.ttl_ms);
        expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Estimates the stored size of a payload: key bytes plus its JSON encoding.
pub fn estimate_size(key: &str, data: &Value) -> u64 {
    let encoded = serde_json::to_string(data).map(|s| s.len()).unwrap_or(0);
    (key.len() + encoded) as u64
}
