//! Persisted state stores.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::PersistConfig;
use crate::cache::CacheManager;

// == Persistence Plugin ==
/// Attaches durable snapshots to application state.
///
/// Snapshots go through a [`CacheManager`], usually one on a session or
/// local backend so they outlive the store instance.
#[derive(Clone)]
pub struct PersistencePlugin {
    cache: Arc<CacheManager>,
}

impl PersistencePlugin {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    /// Wraps `initial` in a [`PersistedStore`] and hydrates it from any
    /// existing snapshot.
    pub async fn attach<S>(&self, initial: S, config: PersistConfig) -> PersistedStore<S>
    where
        S: Serialize + DeserializeOwned + Send,
    {
        let store = PersistedStore {
            state: Mutex::new(initial),
            cache: Arc::clone(&self.cache),
            config,
        };
        store.hydrate().await;
        store
    }
}

// == Persisted Store ==
/// State whose filtered top-level fields are written to the cache after
/// every [`mutate`](PersistedStore::mutate).
///
/// `S` must serialize to a JSON object. Writes are not debounced: each
/// mutation costs one serialization and one storage write.
pub struct PersistedStore<S> {
    state: Mutex<S>,
    cache: Arc<CacheManager>,
    config: PersistConfig,
}

impl<S> PersistedStore<S>
where
    S: Serialize + DeserializeOwned + Send,
{
    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Returns a copy of the current state.
    pub async fn state(&self) -> S
    where
        S: Clone,
    {
        self.state.lock().await.clone()
    }

    /// Runs `f` against the current state.
    pub async fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&*self.state.lock().await)
    }

    // == Mutate ==
    /// Applies `f` to the state, then persists the result.
    ///
    /// The lock is held across the write, so snapshots land in mutation
    /// order.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        self.write_snapshot(&state).await;
        result
    }

    // == Persist ==
    /// Writes the filtered state now. Returns false if the write failed.
    pub async fn persist(&self) -> bool {
        let state = self.state.lock().await;
        self.write_snapshot(&state).await
    }

    // == Hydrate ==
    /// Overlays the persisted fields onto the current state.
    ///
    /// The overlay is shallow: each persisted top-level field replaces the
    /// current one wholesale. Fields the filter rejects are ignored even if
    /// an older snapshot contains them. Returns false when there was no
    /// usable snapshot.
    pub async fn hydrate(&self) -> bool {
        let key = self.config.storage_key();
        let Some(Value::Object(snapshot)) = self.cache.get::<Value>(&key).await else {
            debug!(key = %key, "no snapshot to hydrate from");
            return false;
        };

        let mut state = self.state.lock().await;
        let mut merged = match serde_json::to_value(&*state) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(key = %key, "state does not serialize to an object, skipping hydrate");
                return false;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "state not serializable, skipping hydrate");
                return false;
            }
        };
        merged.extend(self.config.filter(&snapshot));

        match serde_json::from_value(Value::Object(merged)) {
            Ok(hydrated) => {
                *state = hydrated;
                debug!(key = %key, "hydrated state from snapshot");
                true
            }
            Err(err) => {
                warn!(key = %key, error = %err, "snapshot does not fit state, keeping initial state");
                false
            }
        }
    }

    // == Clear Persisted ==
    /// Deletes the snapshot; the in-memory state is untouched.
    pub async fn clear_persisted(&self) -> bool {
        self.cache.delete(&self.config.storage_key()).await
    }

    async fn write_snapshot(&self, state: &S) -> bool {
        let key = self.config.storage_key();
        let fields: Map<String, Value> = match serde_json::to_value(state) {
            Ok(Value::Object(map)) => self.config.filter(&map),
            Ok(_) => {
                warn!(key = %key, "state does not serialize to an object, not persisting");
                return false;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "state not serializable, not persisting");
                return false;
            }
        };

        let stored = self
            .cache
            .set(&key, &fields, Some(self.config.effective_ttl_ms()))
            .await;
        if !stored {
            warn!(key = %key, "snapshot write rejected by storage");
        }
        stored
    }
}
