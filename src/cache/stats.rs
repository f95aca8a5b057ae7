//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of entries evicted to satisfy capacity limits
    pub evictions: u64,
    /// Current number of entries in the backend
    pub item_count: usize,
    /// Current estimated bytes in the backend
    pub size_bytes: u64,
    /// hits / max(1, hits + misses)
    pub hit_rate: f64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / max(1, hits + misses), so 0.0 before any access.
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        hits as f64 / (hits + misses).max(1) as f64
    }
}

// == Counters ==
/// Lock-free hit/miss counters shared by concurrent readers.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::compute_hit_rate(0, 0), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        assert_eq!(CacheStats::compute_hit_rate(3, 0), 1.0);
    }

    #[test]
    fn test_hit_rate_all_misses() {
        assert_eq!(CacheStats::compute_hit_rate(0, 2), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        assert_eq!(CacheStats::compute_hit_rate(1, 1), 0.5);
    }

    #[test]
    fn test_counters() {
        let counters = Counters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.hits(), 2);
        assert_eq!(counters.misses(), 1);
    }
}
