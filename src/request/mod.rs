//! Request Module
//!
//! Everything between a caller's request and the network: cache keys,
//! strategy resolution, in-flight dedup, retry and the outbound fetcher.

mod client;
mod dedupe;
mod fetcher;
mod key;
mod retry;
mod strategy;
mod wrap;

pub use client::CachedClient;
pub use dedupe::Deduplicator;
pub use fetcher::{Fetcher, HttpFetcher};
pub use key::{canonical_json, generate_api_cache_key, normalize_url, request_cache_key, API_KEY_PREFIX};
pub use retry::{retry, RetryPolicy};
pub use strategy::{Strategy, StrategyConfig, StrategyTable};
pub use wrap::{cached, Cached, FN_KEY_PREFIX};
