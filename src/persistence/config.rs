//! Persistence configuration and field filtering.

use serde_json::{Map, Value};

/// Prefix of every key written by the persistence plugin.
pub const PERSIST_KEY_PREFIX: &str = "persist:";

// == Persist Config ==
/// Which store to persist, and which of its top-level fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistConfig {
    /// Store id; the snapshot lives under `persist:<key>`
    pub key: String,
    /// Allow-list of top-level fields; empty means all fields
    pub include: Vec<String>,
    /// Fields dropped after `include` is applied
    pub exclude: Vec<String>,
    /// Snapshot lifetime; `None` keeps it until cleared
    pub ttl_ms: Option<u64>,
}

impl PersistConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            include: Vec::new(),
            exclude: Vec::new(),
            ttl_ms: None,
        }
    }

    pub fn include<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// Cache key of the snapshot.
    pub fn storage_key(&self) -> String {
        format!("{}{}", PERSIST_KEY_PREFIX, self.key)
    }

    /// TTL passed to the cache; `u64::MAX` when no TTL was configured.
    pub(crate) fn effective_ttl_ms(&self) -> u64 {
        self.ttl_ms.unwrap_or(u64::MAX)
    }

    /// Returns true if `field` survives the include/exclude filter.
    pub fn allows(&self, field: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|f| f == field);
        included && !self.exclude.iter().any(|f| f == field)
    }

    /// Keeps only the fields of `state` that pass the filter.
    pub fn filter(&self, state: &Map<String, Value>) -> Map<String, Value> {
        state
            .iter()
            .filter(|(field, _)| self.allows(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}
