//! Request Deduplicator
//!
//! Collapses concurrent identical requests into one in-flight future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;

type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

// == Deduplicator ==
/// Registry of in-flight requests keyed by request signature.
///
/// At most one future is registered per signature. Later callers with the
/// same signature await that future instead of starting their own, and all
/// of them observe the same value or the same error. The entry is removed as
/// soon as the future settles, on success and on failure.
///
/// There is no timeout: a producer that never settles keeps its entry.
pub struct Deduplicator<T> {
    in_flight: Arc<Mutex<HashMap<String, InFlight<T>>>>,
}

impl<T> Clone for Deduplicator<T> {
    fn clone(&self) -> Self {
        Self {
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<T> Default for Deduplicator<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> Deduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Dedupe ==
    /// Runs `producer` unless a request with `signature` is already in
    /// flight, in which case its result is shared instead.
    pub async fn dedupe<F, Fut>(&self, signature: &str, producer: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(signature) {
                Some(existing) => {
                    debug!(signature, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.in_flight);
                    let owned_signature = signature.to_string();
                    let work = producer();
                    let future = async move {
                        let result = work.await;
                        registry.lock().remove(&owned_signature);
                        trace!(signature = %owned_signature, "in-flight request settled");
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(signature.to_string(), future.clone());
                    future
                }
            }
        };

        shared.await
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, signature: &str) -> bool {
        self.in_flight.lock().contains_key(signature)
    }
}
