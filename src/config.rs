//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CacheError;

// == Storage Type ==
/// Selects which storage backend a cache instance is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// Bounded in-process map; gone when the process exits
    #[default]
    Memory,
    /// Durable tier scoped to the running session (quota-bounded string store)
    Session,
    /// Durable tier that survives restarts (file-backed string store)
    Local,
}

impl FromStr for StorageType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "session" | "sessiondurable" | "sessionstorage" => Ok(StorageType::Session),
            "local" | "localdurable" | "localstorage" => Ok(StorageType::Local),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown storage type '{}'",
                other
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend selection
    pub storage_type: StorageType,
    /// Default TTL in milliseconds for entries without explicit TTL
    pub ttl_ms: u64,
    /// Maximum number of entries held by the memory backend
    pub max_items: usize,
    /// Maximum estimated bytes held by the memory backend
    pub max_size_bytes: u64,
    /// Byte quota of the durable raw stores
    pub quota_bytes: u64,
    /// Backing file of the local durable tier
    pub file_path: PathBuf,
    /// Key prefix used by durable backends inside the shared raw store
    pub namespace: String,
    /// Background cleanup task interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// Retry budget for strategies that enable retries
    pub max_retries: u32,
    /// Whether network failures are retried by default
    pub retry_on_error: bool,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORAGE_TYPE` - memory, session or local (default: memory)
    /// - `CACHE_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_MAX_ITEMS` - Maximum memory entries (default: 1000)
    /// - `CACHE_MAX_SIZE` - Maximum memory bytes (default: 5 MiB)
    /// - `CACHE_QUOTA_BYTES` - Durable store quota (default: 5 MiB)
    /// - `CACHE_FILE_PATH` - Local tier file (default: cms_cache.json)
    /// - `CACHE_NAMESPACE` - Durable key prefix (default: cache:)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep frequency (default: 60000)
    /// - `CACHE_MAX_RETRIES` - Retry budget (default: 3)
    /// - `CACHE_RETRY_ON_ERROR` - Retry network failures (default: false)
    ///
    /// Unparseable numbers fall back to their default; an unknown storage
    /// type is an error.
    pub fn from_env() -> Result<Self, CacheError> {
        let defaults = Self::default();
        let storage_type = match env::var("CACHE_STORAGE_TYPE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.storage_type,
        };

        Ok(Self {
            storage_type,
            ttl_ms: parse_env("CACHE_TTL_MS").unwrap_or(defaults.ttl_ms),
            max_items: parse_env("CACHE_MAX_ITEMS").unwrap_or(defaults.max_items),
            max_size_bytes: parse_env("CACHE_MAX_SIZE").unwrap_or(defaults.max_size_bytes),
            quota_bytes: parse_env("CACHE_QUOTA_BYTES").unwrap_or(defaults.quota_bytes),
            file_path: env::var("CACHE_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            cleanup_interval_ms: parse_env("CACHE_CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval_ms),
            max_retries: parse_env("CACHE_MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_on_error: parse_env("CACHE_RETRY_ON_ERROR").unwrap_or(defaults.retry_on_error),
        })
    }

    // == Builders ==
    /// Returns a copy using the given backend.
    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    /// Returns a copy using the given default TTL.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Returns a copy with the given memory capacity limits.
    pub fn with_limits(mut self, max_items: usize, max_size_bytes: u64) -> Self {
        self.max_items = max_items;
        self.max_size_bytes = max_size_bytes;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            ttl_ms: 5 * 60 * 1000,
            max_items: 1000,
            max_size_bytes: 5 * 1024 * 1024,
            quota_bytes: 5 * 1024 * 1024,
            file_path: PathBuf::from("cms_cache.json"),
            namespace: "cache:".to_string(),
            cleanup_interval_ms: 60_000,
            max_retries: 3,
            retry_on_error: false,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
