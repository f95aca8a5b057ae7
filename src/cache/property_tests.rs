//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache manager and memory backend against
//! arbitrary operation sequences.

use proptest::prelude::*;
use regex::Regex;
use std::collections::HashSet;

use crate::cache::CacheManager;
use crate::storage::{Backend, MemoryBackend};

// == Test Configuration ==
const TEST_MAX_ITEMS: usize = 100;
const TEST_MAX_SIZE: u64 = 1 << 20;
const TEST_DEFAULT_TTL_MS: u64 = 300_000;

fn manager(max_items: usize, max_size: u64) -> CacheManager {
    CacheManager::new(
        Backend::Memory(MemoryBackend::new(max_items, max_size)),
        TEST_DEFAULT_TTL_MS,
    )
}

// == Strategies ==
/// Generates valid cache keys
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,32}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,128}".prop_map(|s| s)
}

/// A single operation against the cache
#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Has { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Hits and misses reported by stats match what get/has observed.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = manager(TEST_MAX_ITEMS, TEST_MAX_SIZE);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        tokio_test::block_on(async {
            for op in ops {
                match op {
                    CacheOp::Set { key, value } => {
                        cache.set(&key, &value, None).await;
                    }
                    CacheOp::Get { key } => match cache.get::<String>(&key).await {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    },
                    CacheOp::Has { key } => {
                        if cache.has(&key).await {
                            expected_hits += 1;
                        } else {
                            expected_misses += 1;
                        }
                    }
                    CacheOp::Delete { key } => {
                        cache.delete(&key).await;
                    }
                }
            }
        });

        let stats = tokio_test::block_on(cache.stats());
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        let expected_rate = expected_hits as f64 / (expected_hits + expected_misses).max(1) as f64;
        prop_assert_eq!(stats.hit_rate, expected_rate);
    }

    // Storing a value and reading it back before expiry returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache = manager(TEST_MAX_ITEMS, TEST_MAX_SIZE);

        let retrieved = tokio_test::block_on(async {
            cache.set(&key, &value, None).await;
            cache.get::<String>(&key).await
        });

        prop_assert_eq!(retrieved, Some(value));
    }

    // The last write to a key wins.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let cache = manager(TEST_MAX_ITEMS, TEST_MAX_SIZE);

        let (retrieved, keys) = tokio_test::block_on(async {
            cache.set(&key, &value1, None).await;
            cache.set(&key, &value2, None).await;
            (cache.get::<String>(&key).await, cache.keys().await)
        });

        prop_assert_eq!(retrieved, Some(value2));
        prop_assert_eq!(keys.len(), 1);
    }

    // Neither the item limit nor the byte limit is ever exceeded.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec(
            (valid_key_strategy(), valid_value_strategy()),
            1..200
        )
    ) {
        let max_items = 20;
        let max_size = 2_000;
        let cache = manager(max_items, max_size);

        for (key, value) in entries {
            let stats = tokio_test::block_on(async {
                cache.set(&key, &value, None).await;
                cache.stats().await
            });
            prop_assert!(stats.item_count <= max_items, "{} items exceeds {}", stats.item_count, max_items);
            prop_assert!(stats.size_bytes <= max_size, "{} bytes exceeds {}", stats.size_bytes, max_size);
        }
    }

    // Pattern invalidation removes exactly the matching keys.
    #[test]
    fn prop_invalidate_pattern_removes_only_matches(
        keys in prop::collection::hash_set(
            prop_oneof![
                valid_key_strategy(),
                valid_key_strategy().prop_map(|k| format!("user:{k}")),
            ],
            1..30
        )
    ) {
        let cache = manager(TEST_MAX_ITEMS, TEST_MAX_SIZE);
        let pattern = Regex::new("^user:").unwrap();

        let (removed, remaining) = tokio_test::block_on(async {
            for key in &keys {
                cache.set(key, &1, None).await;
            }
            let removed = cache.invalidate_pattern(&pattern).await;
            (removed, cache.keys().await)
        });

        let expected: HashSet<&String> = keys.iter().filter(|k| !pattern.is_match(k)).collect();
        let remaining: HashSet<&String> = remaining.iter().collect();
        prop_assert_eq!(removed, keys.len() - expected.len());
        prop_assert_eq!(remaining, expected);
    }
}
