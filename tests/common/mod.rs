//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cms_cache::{
    ApiRequest, ApiResponse, Backend, CacheError, CacheManager, Fetcher, Result,
};
use cms_cache::storage::MemoryBackend;
use parking_lot::Mutex;
use serde_json::Value;

// == Mock Fetcher ==

/// Programmable [`Fetcher`] that counts calls per path.
///
/// Paths without a programmed reply answer `404`. A programmed failure
/// takes precedence over a response until it is cleared.
#[derive(Default)]
pub struct MockFetcher {
    calls: AtomicUsize,
    per_path: Mutex<HashMap<String, usize>>,
    responses: Mutex<HashMap<String, ApiResponse>>,
    failures: Mutex<HashMap<String, CacheError>>,
    delay: Mutex<Duration>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.responses
            .lock()
            .insert(path.to_string(), ApiResponse::new(status, body));
    }

    pub fn fail(&self, path: &str, error: CacheError) {
        self.failures.lock().insert(path.to_string(), error);
    }

    pub fn recover(&self, path: &str) {
        self.failures.lock().remove(path);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Total calls across all paths.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.per_path.lock().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = request.path();
        *self.per_path.lock().entry(path.clone()).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.lock().get(&path).cloned() {
            return Err(err);
        }
        let response = self.responses.lock().get(&path).cloned();
        Ok(response.unwrap_or_else(|| ApiResponse::new(404, Value::String("not found".into()))))
    }
}

// == Helpers ==

pub fn memory_cache() -> Arc<CacheManager> {
    Arc::new(CacheManager::new(
        Backend::Memory(MemoryBackend::new(1000, 5 * 1024 * 1024)),
        300_000,
    ))
}
