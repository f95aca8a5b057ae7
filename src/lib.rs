//! CMS Cache - client-side caching layer for a CMS JSON API
//!
//! Tiered storage (memory, session, local file) with TTL expiry and
//! bounded eviction, per-endpoint fetch strategies, request dedup with
//! retry, and durable persistence of application state.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persistence;
pub mod request;
pub mod storage;
pub mod tasks;

pub use cache::{CacheManager, CacheStats};
pub use config::{CacheConfig, StorageType};
pub use error::{CacheError, Result};
pub use models::{ApiRequest, ApiResponse, Method};
pub use persistence::{PersistConfig, PersistedStore, PersistencePlugin};
pub use request::{
    cached, CachedClient, Fetcher, HttpFetcher, RetryPolicy, Strategy, StrategyConfig,
    StrategyTable,
};
pub use storage::{Backend, StorageBackend};
pub use tasks::spawn_cleanup_task;
