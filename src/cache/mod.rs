//! Cache Module
//!
//! TTL-aware cache manager with hit/miss statistics and pattern
//! invalidation, running on any storage backend.

mod manager;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use manager::CacheManager;
pub use stats::CacheStats;
