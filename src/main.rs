//! CMS cache warmer
//!
//! Prefetches the configured read endpoints through the caching client,
//! then prints cache statistics as JSON. Useful for priming a local-tier
//! cache file before the site starts serving.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cms_cache::{
    spawn_cleanup_task, ApiRequest, CacheConfig, CacheManager, CachedClient, HttpFetcher,
    StrategyTable,
};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_WARM_ENDPOINTS: &str = "/api/site-config,/api/categories,/api/posts";

/// Main entry point for the cache warmer.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load cache configuration from environment variables
/// 3. Create the cache manager on the configured backend
/// 4. Start background TTL sweep task
/// 5. Prefetch every endpoint in `WARM_ENDPOINTS`
/// 6. Print statistics and stop the sweep
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cms_cache=info,cms_cache_warm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CMS cache warmer");

    let config = CacheConfig::from_env().context("invalid cache configuration")?;
    let base_url =
        std::env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
    let endpoints =
        std::env::var("WARM_ENDPOINTS").unwrap_or_else(|_| DEFAULT_WARM_ENDPOINTS.to_string());
    info!(
        "Configuration loaded: storage={:?}, ttl={}ms, max_items={}, api={}",
        config.storage_type, config.ttl_ms, config.max_items, base_url
    );

    let cache = Arc::new(CacheManager::from_config(&config).context("failed to open cache backend")?);
    info!(backend = cache.backend_name(), "Cache manager initialized");

    let sweep = spawn_cleanup_task(
        cache.clone(),
        Duration::from_millis(config.cleanup_interval_ms),
    );

    let fetcher = HttpFetcher::new(&base_url).context("failed to build HTTP client")?;
    let client = CachedClient::new(Arc::new(fetcher), cache.clone(), StrategyTable::cms_defaults());

    let requests: Vec<ApiRequest> = endpoints
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(ApiRequest::get)
        .collect();

    tokio::select! {
        warmed = client.prefetch(&requests) => {
            if warmed < requests.len() {
                warn!("Warmed {} of {} endpoints", warmed, requests.len());
            }
        }
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping prefetch");
        }
    }

    let stats = cache.stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    sweep.abort();
    info!("Cache warmer finished");
    Ok(())
}
