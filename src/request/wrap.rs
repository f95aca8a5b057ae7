//! Caching wrapper for arbitrary async functions.
//!
//! [`cached`] turns `Fn(Args) -> Future<Output = Result<T>>` into a callable
//! that applies a [`StrategyConfig`] keyed by function name and arguments.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::client::execute_strategy;
use super::dedupe::Deduplicator;
use super::key::canonical_json;
use super::retry::RetryPolicy;
use super::strategy::StrategyConfig;
use crate::cache::CacheManager;
use crate::error::Result;

/// Prefix of every key produced by [`cached`].
pub const FN_KEY_PREFIX: &str = "fn:";

// == Cached ==
/// A function wrapped by [`cached`].
pub struct Cached<A, T, F> {
    cache: Arc<CacheManager>,
    name: String,
    config: StrategyConfig,
    retry_policy: RetryPolicy,
    producer: Arc<F>,
    dedupe: Deduplicator<T>,
    _args: std::marker::PhantomData<fn(A)>,
}

impl<A, T, F> Clone for Cached<A, T, F> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            name: self.name.clone(),
            config: self.config,
            retry_policy: self.retry_policy,
            producer: Arc::clone(&self.producer),
            dedupe: self.dedupe.clone(),
            _args: std::marker::PhantomData,
        }
    }
}

/// Wraps `producer` so calls are served under `config`.
///
/// The cache key is `fn:<name>:<canonical JSON of args>`, so two calls with
/// equal arguments share an entry. Concurrent calls with equal arguments
/// share one invocation of `producer`.
pub fn cached<A, T, F, Fut>(
    cache: Arc<CacheManager>,
    name: impl Into<String>,
    config: StrategyConfig,
    producer: F,
) -> Cached<A, T, F>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Cached {
        cache,
        name: name.into(),
        config,
        retry_policy: RetryPolicy::default(),
        producer: Arc::new(producer),
        dedupe: Deduplicator::default(),
        _args: std::marker::PhantomData,
    }
}

impl<A, T, F, Fut> Cached<A, T, F>
where
    A: Serialize + Clone + Send + Sync + 'static,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Cache key for a call with `args`.
    pub fn key_for(&self, args: &A) -> String {
        let args = serde_json::to_value(args).unwrap_or(Value::Null);
        format!("{}{}:{}", FN_KEY_PREFIX, self.name, canonical_json(&args))
    }

    /// Calls the wrapped function through the cache.
    pub async fn call(&self, args: A) -> Result<T> {
        let key = self.key_for(&args);
        let config = self.config;
        let producer = Arc::clone(&self.producer);
        let dedupe = self.dedupe.clone();
        let policy = self.retry_policy;
        let signature = key.clone();

        execute_strategy(&self.cache, &key, &config, move || async move {
            dedupe
                .dedupe(&signature, move || async move {
                    if config.retry_on_error {
                        policy
                            .retry(config.max_retries, || (*producer)(args.clone()))
                            .await
                    } else {
                        (*producer)(args).await
                    }
                })
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use crate::request::Strategy;
    use crate::storage::{Backend, MemoryBackend};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache() -> Arc<CacheManager> {
        Arc::new(CacheManager::new(
            Backend::Memory(MemoryBackend::new(100, 1 << 20)),
            60_000,
        ))
    }

    #[tokio::test]
    async fn test_cached_function_runs_once_per_args() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lookup = cached(
            cache(),
            "post_by_slug",
            StrategyConfig::new(Strategy::CacheFirst, 60_000),
            move |slug: String| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "slug": slug }))
                }
            },
        );

        let first = lookup.call("hello".to_string()).await.unwrap();
        let second = lookup.call("hello".to_string()).await.unwrap();
        lookup.call("other".to_string()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_key_ignores_object_field_order() {
        let wrapped = cached(
            cache(),
            "search",
            StrategyConfig::default(),
            |_args: Value| async { Ok(0u32) },
        );

        assert_eq!(
            wrapped.key_for(&json!({"q": "rust", "page": 1})),
            wrapped.key_for(&json!({"page": 1, "q": "rust"}))
        );
        assert!(wrapped.key_for(&json!(1)).starts_with("fn:search:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_applies_to_wrapped_function() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = cached(
            cache(),
            "flaky",
            StrategyConfig::new(Strategy::NetworkOnly, 60_000).with_retries(2),
            move |_: ()| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CacheError::network("reset"))
                    } else {
                        Ok(9u32)
                    }
                }
            },
        )
        .with_retry_policy(RetryPolicy::new(
            Duration::from_millis(10),
            Duration::from_millis(10),
        ));

        assert_eq!(flaky.call(()).await, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
