//! Cache Statistics Module
//!
//! Hit/miss instrumentation that only counts while debug mode is on.

use serde::Serialize;

// == Cache Stats ==
/// Counters plus the entry count, as reported to callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of reads that returned a value
    pub hits: u64,
    /// Number of reads that found nothing (key absent or expired)
    pub misses: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been counted.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Hit Counter ==
/// Read counters gated by the debug flag.
///
/// Reads are only counted while enabled. Disabling hides the counters
/// without discarding them, so re-enabling shows the values from before.
#[derive(Debug, Default)]
pub struct HitCounter {
    enabled: bool,
    hits: u64,
    misses: u64,
}

impl HitCounter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    // == Record Read ==
    /// Counts one read as a hit or a miss. No-op while disabled.
    pub fn record(&mut self, hit: bool) {
        if !self.enabled {
            return;
        }
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    /// Hits counted so far, 0 while disabled.
    pub fn hits(&self) -> u64 {
        if self.enabled {
            self.hits
        } else {
            0
        }
    }

    /// Misses counted so far, 0 while disabled.
    pub fn misses(&self) -> u64 {
        if self.enabled {
            self.misses
        } else {
            0
        }
    }

    // == Clear ==
    /// Zeroes both counters, but only while enabled.
    ///
    /// A clear made with debug mode off leaves the hidden counts intact.
    pub fn clear(&mut self) {
        if self.enabled {
            self.hits = 0;
            self.misses = 0;
        }
    }

    // == Report ==
    /// Visible counters together with the given entry count.
    pub fn report(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            total_entries,
        }
    }
}
