//! Insertion Order Module
//!
//! Tracks the order in which keys first entered the cache.

use std::collections::BTreeMap;

// == Insertion Order ==
/// Remembers when each key was inserted so `keys()` can report them oldest first.
///
/// Every insertion is stamped with a monotonically increasing sequence number.
/// Overwriting a key keeps its original stamp; only removal forgets it.
#[derive(Debug)]
pub struct InsertionOrder<K> {
    /// Sequence number -> key, iterated in ascending order
    order: BTreeMap<u64, K>,
    /// Next sequence number to hand out
    next_seq: u64,
}

impl<K> InsertionOrder<K> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    // == Push ==
    /// Appends a key and returns the sequence number that identifies it.
    pub fn push(&mut self, key: K) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key);
        seq
    }

    // == Remove ==
    /// Forgets the key stamped with `seq`.
    pub fn remove(&mut self, seq: u64) -> Option<K> {
        self.order.remove(&seq)
    }

    // == Iterate ==
    /// Keys from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
    }
}

impl<K> Default for InsertionOrder<K> {
    fn default() -> Self {
        Self::new()
    }
}
