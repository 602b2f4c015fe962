//! Memo Statistics Module
//!
//! Tracks hits, misses, evictions, coalesced waits and producer failures.

use serde::Serialize;

// == Memo Stats ==
/// Counters for one memoized wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoStats {
    /// Calls served from a fresh entry
    pub hits: u64,
    /// Calls that invoked the producer
    pub misses: u64,
    /// Entries dropped to respect the capacity bound
    pub evictions: u64,
    /// Calls that waited on another caller's in-flight computation
    pub coalesced: u64,
    /// Producer invocations that returned an error
    pub failures: u64,
    /// Current number of stored entries
    pub total_entries: usize,
}

impl MemoStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
