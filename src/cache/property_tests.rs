//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a plain HashMap model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::cache::CacheStore;
use crate::error::CacheError;

// == Test Configuration ==
const TEST_SHARDS: usize = 8;

// == Strategies ==
/// Generates valid cache keys (non-empty)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,16}".prop_map(|s| s)
}

/// Generates cache values
fn valid_value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..128)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Vec<u8> },
    Get { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), valid_value_strategy())
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any sequence of non-expiring SET/GET behaves like a HashMap, and the
    // hit/miss counters agree with the model.
    #[test]
    fn prop_matches_hashmap_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let rt = runtime();
        let store = CacheStore::new(TEST_SHARDS);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    rt.block_on(store.set(&key, Bytes::from(value.clone()), Duration::ZERO)).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    let got = rt.block_on(store.get(&key));
                    match model.get(&key) {
                        Some(expected) => {
                            expected_hits += 1;
                            prop_assert_eq!(got.unwrap(), Bytes::from(expected.clone()));
                        }
                        None => {
                            expected_misses += 1;
                            prop_assert!(matches!(got, Err(CacheError::NotFound(_))));
                        }
                    }
                }
            }
        }

        let stats = rt.block_on(store.stats());
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Storing then immediately retrieving with a positive TTL returns the
    // exact bytes that were stored.
    #[test]
    fn prop_set_then_get_within_ttl(
        key in valid_key_strategy(),
        value in valid_value_strategy(),
        ttl_secs in 1u64..3600
    ) {
        let rt = runtime();
        let store = CacheStore::new(TEST_SHARDS);

        rt.block_on(store.set(&key, Bytes::from(value.clone()), Duration::from_secs(ttl_secs))).unwrap();
        let got = rt.block_on(store.get(&key)).unwrap();
        prop_assert_eq!(got, Bytes::from(value));
    }

    // Overwriting a key leaves exactly one entry holding the last value.
    #[test]
    fn prop_overwrite_semantics(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let rt = runtime();
        let store = CacheStore::new(TEST_SHARDS);

        rt.block_on(store.set(&key, Bytes::from(value1), Duration::ZERO)).unwrap();
        rt.block_on(store.set(&key, Bytes::from(value2.clone()), Duration::ZERO)).unwrap();

        prop_assert_eq!(rt.block_on(store.get(&key)).unwrap(), Bytes::from(value2));
        prop_assert_eq!(rt.block_on(store.len()), 1);
    }

    // A sweep never removes live entries.
    #[test]
    fn prop_cleanup_preserves_live_entries(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..30)
    ) {
        let rt = runtime();
        let store = CacheStore::new(TEST_SHARDS);

        for key in &keys {
            rt.block_on(store.set(key, Bytes::from_static(b"v"), Duration::from_secs(3600))).unwrap();
        }

        prop_assert_eq!(rt.block_on(store.cleanup_expired()), 0);
        prop_assert_eq!(rt.block_on(store.len()), keys.len());
    }
}
