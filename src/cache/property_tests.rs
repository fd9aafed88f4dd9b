//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a simple ordered model.

use proptest::prelude::*;
use std::collections::HashSet;

use crate::cache::{Cache, ImportOptions};

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,32}".prop_map(|s| s)
}

/// A cache operation that needs no timers
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Clear,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Clear),
    ]
}

/// Insertion-ordered reference model
#[derive(Default)]
struct Model {
    entries: Vec<(String, String)>,
}

impl Model {
    fn put(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn delete(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        before != self.entries.len()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

fn filled_cache(entries: &[(String, String)]) -> Cache<String, String> {
    let cache = Cache::new();
    for (key, value) in entries {
        cache.put(key.clone(), value.clone(), None, None).unwrap();
    }
    cache
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 1: Model Agreement**
    // *For any* sequence of untimed operations, reads, deletes, keys and
    // both size counts agree with an insertion-ordered map.
    #[test]
    fn prop_matches_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let cache = Cache::new();
        let mut model = Model::default();

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    let returned = cache.put(key.clone(), value.clone(), None, None).unwrap();
                    prop_assert_eq!(&returned, &value);
                    model.put(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key), model.get(&key));
                }
                CacheOp::Delete { key } => {
                    prop_assert_eq!(cache.delete(&key), model.delete(&key));
                }
                CacheOp::Clear => {
                    cache.clear();
                    model.entries.clear();
                }
            }

            prop_assert_eq!(cache.size(), model.entries.len());
            prop_assert_eq!(cache.mem_size(), cache.size(), "Size counter drifted");
            prop_assert_eq!(cache.keys(), model.keys());
        }
    }

    // **Property 2: Statistics Accuracy**
    // *For any* sequence of operations in debug mode, hits and misses equal
    // the number of reads that found and missed a value since the last clear.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let cache = Cache::builder()
            .debug(true)
            .logger(std::sync::Arc::new(crate::logger::NoopLogger))
            .build();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    cache.put(key, value, None, None).unwrap();
                }
                CacheOp::Get { key } => match cache.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    cache.delete(&key);
                }
                CacheOp::Clear => {
                    cache.clear();
                    expected_hits = 0;
                    expected_misses = 0;
                }
            }
        }

        prop_assert_eq!(cache.hits(), expected_hits, "Hits mismatch");
        prop_assert_eq!(cache.misses(), expected_misses, "Misses mismatch");
        prop_assert_eq!(cache.stats().total_entries, cache.size());
    }

    // **Property 3: Snapshot Restores Contents**
    // *For any* untimed cache, export then clear then import yields the same
    // keys in the same order with the same values.
    #[test]
    fn prop_export_clear_import_restores(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 0..20)
    ) {
        let cache = filled_cache(&entries);
        let keys_before = cache.keys();
        let values_before: Vec<_> = keys_before.iter().map(|k| cache.get(k)).collect();

        let snapshot = cache.export().unwrap();
        cache.clear();
        let size = cache.import(&snapshot, ImportOptions::default()).unwrap();

        prop_assert_eq!(size, keys_before.len());
        prop_assert_eq!(cache.keys(), keys_before.clone());
        let values_after: Vec<_> = keys_before.iter().map(|k| cache.get(k)).collect();
        prop_assert_eq!(values_after, values_before);
    }

    // **Property 4: Duplicate Policy**
    // *For any* destination and snapshot, skipping duplicates keeps every
    // destination value, while the default policy takes the snapshot's.
    #[test]
    fn prop_import_duplicate_policy(
        existing in prop::collection::vec((key_strategy(), value_strategy()), 0..10),
        incoming in prop::collection::vec((key_strategy(), value_strategy()), 0..10)
    ) {
        let snapshot = filled_cache(&incoming).export().unwrap();
        let incoming_model = {
            let mut model = Model::default();
            for (k, v) in &incoming {
                model.put(k.clone(), v.clone());
            }
            model
        };
        let existing_model = {
            let mut model = Model::default();
            for (k, v) in &existing {
                model.put(k.clone(), v.clone());
            }
            model
        };
        let union: HashSet<String> = existing_model
            .keys()
            .into_iter()
            .chain(incoming_model.keys())
            .collect();

        let skipping = filled_cache(&existing);
        let size = skipping.import(&snapshot, ImportOptions::skip_duplicates()).unwrap();
        prop_assert_eq!(size, union.len());
        for key in &union {
            let expected = existing_model.get(key).or_else(|| incoming_model.get(key));
            prop_assert_eq!(skipping.get(key), expected);
        }

        let overwriting = filled_cache(&existing);
        let size = overwriting.import(&snapshot, ImportOptions::default()).unwrap();
        prop_assert_eq!(size, union.len());
        for key in &union {
            let expected = incoming_model.get(key).or_else(|| existing_model.get(key));
            prop_assert_eq!(overwriting.get(key), expected);
        }
    }
}
