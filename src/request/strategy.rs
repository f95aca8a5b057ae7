//! Fetch strategies and per-endpoint strategy resolution.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::key::normalize_url;
use crate::config::CacheConfig;
use crate::error::CacheError;

// == Strategy ==
/// How a request consults the cache and the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Serve a fresh cached value; fetch only on a miss
    CacheFirst,
    /// Always fetch; fall back to any cached value (even expired) on failure
    NetworkFirst,
    /// Serve cached immediately and refresh in the background
    StaleWhileRevalidate,
    /// Always fetch, never touch the cache
    NetworkOnly,
    /// Never fetch; a miss is an error
    CacheOnly,
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "cachefirst" => Ok(Strategy::CacheFirst),
            "networkfirst" => Ok(Strategy::NetworkFirst),
            "stalewhilerevalidate" | "swr" => Ok(Strategy::StaleWhileRevalidate),
            "networkonly" => Ok(Strategy::NetworkOnly),
            "cacheonly" => Ok(Strategy::CacheOnly),
            _ => Err(CacheError::InvalidConfig(format!("unknown strategy '{}'", s))),
        }
    }
}

// == Strategy Config ==
/// Caching behaviour for one class of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyConfig {
    pub strategy: Strategy,
    /// Lifetime of entries written for these endpoints
    pub ttl_ms: u64,
    /// Retry budget when `retry_on_error` is set
    pub max_retries: u32,
    pub retry_on_error: bool,
}

impl StrategyConfig {
    /// Default TTL of the built-in configuration: five minutes.
    pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

    pub fn new(strategy: Strategy, ttl_ms: u64) -> Self {
        Self {
            strategy,
            ttl_ms,
            ..Self::default()
        }
    }

    /// Enables retries with the given budget.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self.retry_on_error = true;
        self
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::NetworkFirst,
            ttl_ms: Self::DEFAULT_TTL_MS,
            max_retries: 3,
            retry_on_error: false,
        }
    }
}

// == Strategy Table ==
/// Maps path prefixes to strategy configurations.
///
/// Resolution picks the longest registered prefix of the normalized request
/// path (query string ignored) and falls back to the table default.
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    routes: Vec<(String, StrategyConfig)>,
    default: StrategyConfig,
}

impl StrategyTable {
    pub fn new(default: StrategyConfig) -> Self {
        Self {
            routes: Vec::new(),
            default,
        }
    }

    /// Table whose default takes TTL and retry policy from `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(StrategyConfig {
            strategy: Strategy::NetworkFirst,
            ttl_ms: config.ttl_ms,
            max_retries: config.max_retries,
            retry_on_error: config.retry_on_error,
        })
    }

    /// Defaults for the CMS read API: site config and categories change
    /// rarely, post listings change often.
    pub fn cms_defaults() -> Self {
        Self::default()
            .register(
                "/api/site-config",
                StrategyConfig::new(Strategy::CacheFirst, 60 * 60 * 1000),
            )
            .register(
                "/api/categories",
                StrategyConfig::new(Strategy::CacheFirst, 10 * 60 * 1000),
            )
            .register(
                "/api/posts",
                StrategyConfig::new(Strategy::StaleWhileRevalidate, 60 * 1000),
            )
    }

    /// Registers `config` for paths starting with `prefix`, replacing any
    /// earlier registration of the same prefix.
    pub fn register(mut self, prefix: impl Into<String>, config: StrategyConfig) -> Self {
        let prefix = prefix.into();
        self.routes.retain(|(p, _)| *p != prefix);
        self.routes.push((prefix, config));
        self
    }

    pub fn default_config(&self) -> StrategyConfig {
        self.default
    }

    /// Resolves the configuration for `url`.
    ///
    /// Matching runs on the normalized path, the same one the cache key is
    /// built from, so requests sharing a key share a strategy.
    pub fn resolve(&self, url: &str) -> StrategyConfig {
        let (path, _) = normalize_url(url);
        self.routes
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, config)| *config)
            .unwrap_or(self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_network_first() {
        let table = StrategyTable::default();
        let config = table.resolve("/api/anything");
        assert_eq!(config.strategy, Strategy::NetworkFirst);
        assert_eq!(config.ttl_ms, StrategyConfig::DEFAULT_TTL_MS);
        assert!(!config.retry_on_error);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = StrategyTable::default()
            .register("/api", StrategyConfig::new(Strategy::NetworkOnly, 0))
            .register("/api/posts", StrategyConfig::new(Strategy::CacheFirst, 1000))
            .register(
                "/api/posts/featured",
                StrategyConfig::new(Strategy::CacheOnly, 2000),
            );

        assert_eq!(table.resolve("/api/users").strategy, Strategy::NetworkOnly);
        assert_eq!(table.resolve("/api/posts/12").strategy, Strategy::CacheFirst);
        assert_eq!(
            table.resolve("/api/posts/featured?limit=3").strategy,
            Strategy::CacheOnly
        );
        assert_eq!(table.resolve("/health").strategy, Strategy::NetworkFirst);
    }

    #[test]
    fn test_query_string_ignored_for_lookup() {
        let table = StrategyTable::default()
            .register("/api/categories", StrategyConfig::new(Strategy::CacheFirst, 1000));
        assert_eq!(
            table.resolve("/api/categories?lang=en").strategy,
            Strategy::CacheFirst
        );
    }

    #[test]
    fn test_equivalent_paths_resolve_alike() {
        let table = StrategyTable::default()
            .register("/api/categories", StrategyConfig::new(Strategy::CacheFirst, 1000));

        for url in ["/api//categories", "api/categories", "/api/categories/", "/api/categories#top"] {
            assert_eq!(table.resolve(url).strategy, Strategy::CacheFirst, "{url}");
        }
    }

    #[test]
    fn test_register_replaces_prefix() {
        let table = StrategyTable::default()
            .register("/api/posts", StrategyConfig::new(Strategy::CacheFirst, 1000))
            .register("/api/posts", StrategyConfig::new(Strategy::NetworkOnly, 1000));
        assert_eq!(table.resolve("/api/posts").strategy, Strategy::NetworkOnly);
    }

    #[test]
    fn test_from_config_uses_retry_policy() {
        let mut config = CacheConfig::default().with_ttl_ms(1234);
        config.retry_on_error = true;
        config.max_retries = 5;

        let table = StrategyTable::from_config(&config);
        let resolved = table.default_config();
        assert_eq!(resolved.ttl_ms, 1234);
        assert_eq!(resolved.max_retries, 5);
        assert!(resolved.retry_on_error);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("CACHE_FIRST".parse::<Strategy>().unwrap(), Strategy::CacheFirst);
        assert_eq!(
            "stale-while-revalidate".parse::<Strategy>().unwrap(),
            Strategy::StaleWhileRevalidate
        );
        assert_eq!("networkOnly".parse::<Strategy>().unwrap(), Strategy::NetworkOnly);
        assert!("sometimes".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_with_retries_enables_retry() {
        let config = StrategyConfig::new(Strategy::NetworkFirst, 1000).with_retries(2);
        assert!(config.retry_on_error);
        assert_eq!(config.max_retries, 2);
    }
}
