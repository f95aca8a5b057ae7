//! Cached request client.
//!
//! Runs every request through the same sequence: resolve key and strategy,
//! check the cache, fetch from the network when the strategy calls for it,
//! store 2xx results, and fall back to stale data where the strategy allows.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::dedupe::Deduplicator;
use super::fetcher::Fetcher;
use super::key::API_KEY_PREFIX;
use super::retry::RetryPolicy;
use super::strategy::{Strategy, StrategyConfig, StrategyTable};
use crate::cache::CacheManager;
use crate::error::{CacheError, Result};
use crate::models::{ApiRequest, ApiResponse};

// == Strategy Engine ==
/// Resolves `key` under `config` using `fetch` as the network leg.
///
/// Shared by [`CachedClient`] and [`Cached`](super::Cached). `fetch` may be
/// called twice for stale-while-revalidate: once in the background after
/// serving the cached value. Background failures are logged and dropped.
pub(crate) async fn execute_strategy<T, F, Fut>(
    cache: &Arc<CacheManager>,
    key: &str,
    config: &StrategyConfig,
    fetch: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    debug!(key, strategy = ?config.strategy, "resolved strategy");

    match config.strategy {
        Strategy::CacheFirst => {
            if let Some(cached) = cache.get::<T>(key).await {
                debug!(key, "serving cached value");
                return Ok(cached);
            }
            fetch_and_store(cache, key, config, fetch).await
        }

        Strategy::NetworkFirst => match fetch().await {
            Ok(fresh) => {
                cache.set(key, &fresh, Some(config.ttl_ms)).await;
                Ok(fresh)
            }
            Err(err) => match cache.peek_stale::<T>(key).await {
                Some(stale) => {
                    warn!(key, error = %err, "network failed, serving stale cached value");
                    Ok(stale)
                }
                None => Err(err),
            },
        },

        Strategy::StaleWhileRevalidate => {
            let Some(cached) = cache.get::<T>(key).await else {
                return fetch_and_store(cache, key, config, fetch).await;
            };

            let cache = Arc::clone(cache);
            let owned_key = key.to_string();
            let ttl_ms = config.ttl_ms;
            tokio::spawn(async move {
                match fetch().await {
                    Ok(fresh) => {
                        cache.set(&owned_key, &fresh, Some(ttl_ms)).await;
                        debug!(key = %owned_key, "background revalidation stored fresh value");
                    }
                    Err(err) => {
                        warn!(key = %owned_key, error = %err, "background revalidation failed");
                    }
                }
            });

            debug!(key, "serving cached value while revalidating");
            Ok(cached)
        }

        Strategy::NetworkOnly => fetch().await,

        Strategy::CacheOnly => cache
            .get::<T>(key)
            .await
            .ok_or_else(|| CacheError::NoCachedData(key.to_string())),
    }
}

async fn fetch_and_store<T, F, Fut>(
    cache: &Arc<CacheManager>,
    key: &str,
    config: &StrategyConfig,
    fetch: F,
) -> Result<T>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let fresh = fetch().await?;
    cache.set(key, &fresh, Some(config.ttl_ms)).await;
    Ok(fresh)
}

// == Cached Client ==
/// Strategy-dispatching entry point for API requests.
///
/// Network calls go through one shared [`Deduplicator`], so concurrent
/// identical requests produce a single fetch. Non-2xx responses are turned
/// into [`CacheError::Network`] and never stored.
///
/// Same-key writes are last-write-wins: a slow background revalidation may
/// overwrite a value stored moments earlier by a faster request.
#[derive(Clone)]
pub struct CachedClient {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<CacheManager>,
    strategies: Arc<StrategyTable>,
    dedupe: Deduplicator<ApiResponse>,
    retry_policy: RetryPolicy,
}

impl CachedClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<CacheManager>, strategies: StrategyTable) -> Self {
        Self {
            fetcher,
            cache,
            strategies: Arc::new(strategies),
            dedupe: Deduplicator::new(),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the backoff used when a strategy enables retries.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Shares an existing in-flight registry, e.g. between clients that
    /// front different caches.
    pub fn with_deduplicator(mut self, dedupe: Deduplicator<ApiResponse>) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    pub fn deduplicator(&self) -> &Deduplicator<ApiResponse> {
        &self.dedupe
    }

    // == Cached Request ==
    /// Performs `request` under the strategy registered for its path.
    ///
    /// Mutating methods (`POST`, `PUT`, `PATCH`, `DELETE`) always run as
    /// [`Strategy::NetworkOnly`]: they are never stored, and a failed write
    /// is never answered from the cache. Retry settings are kept.
    pub async fn cached_request(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut config = self.strategies.resolve(&request.url);
        if request.method.is_mutating() && config.strategy != Strategy::NetworkOnly {
            debug!(url = %request.url, method = ?request.method, "mutating request bypasses cache");
            config.strategy = Strategy::NetworkOnly;
        }
        self.cached_request_with(request, config).await
    }

    /// Performs `request` under an explicit strategy configuration.
    ///
    /// Unlike [`cached_request`](Self::cached_request) the strategy is used
    /// as given, so a read-only `POST` endpoint (search, GraphQL) can be
    /// cached by passing a caching strategy here.
    pub async fn cached_request_with(
        &self,
        request: &ApiRequest,
        config: StrategyConfig,
    ) -> Result<ApiResponse> {
        let key = request.signature();
        let client = self.clone();
        let owned = request.clone();
        execute_strategy(&self.cache, &key, &config, move || async move {
            client.fetch(&owned, &config).await
        })
        .await
    }

    /// Performs `request` and decodes the response body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        self.cached_request(request).await?.json()
    }

    // == Network Leg ==
    /// Deduplicated (and, if configured, retried) network call.
    async fn fetch(&self, request: &ApiRequest, config: &StrategyConfig) -> Result<ApiResponse> {
        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.retry_policy;
        let owned = request.clone();
        let retry_on_error = config.retry_on_error;
        let max_retries = config.max_retries;

        self.dedupe
            .dedupe(&request.signature(), move || async move {
                if retry_on_error {
                    policy
                        .retry(max_retries, || execute_checked(fetcher.as_ref(), &owned))
                        .await
                } else {
                    execute_checked(fetcher.as_ref(), &owned).await
                }
            })
            .await
    }

    // == Prefetch ==
    /// Warms the cache by performing every request concurrently.
    ///
    /// Returns how many succeeded; failures are logged.
    pub async fn prefetch(&self, requests: &[ApiRequest]) -> usize {
        let results = join_all(requests.iter().map(|r| self.cached_request(r))).await;

        let mut warmed = 0;
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(_) => warmed += 1,
                Err(err) => warn!(url = %request.url, error = %err, "prefetch failed"),
            }
        }
        info!(warmed, total = requests.len(), "prefetch complete");
        warmed
    }

    // == Invalidate ==
    /// Drops every cached response whose path starts with `path_prefix`,
    /// for any method.
    pub async fn invalidate(&self, path_prefix: &str) -> usize {
        let pattern = format!(
            "^{}[A-Z]+:{}",
            regex::escape(API_KEY_PREFIX),
            regex::escape(path_prefix)
        );
        match Regex::new(&pattern) {
            Ok(regex) => self.cache.invalidate_pattern(&regex).await,
            Err(err) => {
                warn!(path_prefix, error = %err, "invalid invalidation prefix");
                0
            }
        }
    }
}

/// Executes `request`, mapping non-2xx statuses to a network error.
async fn execute_checked(fetcher: &dyn Fetcher, request: &ApiRequest) -> Result<ApiResponse> {
    let response = fetcher.execute(request).await?;
    if response.is_success() {
        return Ok(response);
    }

    let message = match &response.body {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => format!("{} {}", request.method, request.url),
        other => other.to_string(),
    };
    Err(CacheError::status(response.status, message))
}
