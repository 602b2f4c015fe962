//! Cache Table Module
//!
//! Key to entry storage with optional LRU bound and an in-flight registry.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use tokio::time::Instant;

use crate::memo::{CacheEntry, CacheKey, EntryInfo, LruTracker, MemoStats};

/// Resolves with the leader's value once it is stored, or with `Canceled` if
/// the leader failed or was dropped first.
pub type FlightSignal<V> = Shared<oneshot::Receiver<V>>;

struct Flight<V> {
    id: u64,
    done: FlightSignal<V>,
}

// == Flight Role ==
/// Outcome of joining the in-flight registry for a key.
pub enum FlightRole<V> {
    /// Caller must compute the value and send it on `done_tx`. Dropping the
    /// sender instead wakes followers empty-handed.
    Lead {
        id: u64,
        done_tx: oneshot::Sender<V>,
    },
    /// Another caller is computing the value.
    Follow(FlightSignal<V>),
}

// == Cache Table ==
/// Storage behind one memoized wrapper.
pub struct CacheTable<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, Flight<V>>,
    lru: LruTracker,
    stats: MemoStats,
    /// None = unbounded
    max_entries: Option<usize>,
    next_flight_id: u64,
}

impl<V> CacheTable<V> {
    // == Constructor ==
    /// Creates an empty table.
    ///
    /// # Arguments
    /// * `max_entries` - Capacity bound, None keeps every key until overwritten
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            lru: LruTracker::new(),
            stats: MemoStats::new(),
            max_entries,
            next_flight_id: 0,
        }
    }

    // == Fresh Value ==
    /// Returns a clone of the value stored under `key` if it is still fresh.
    ///
    /// Records a hit when a value is returned. Stale entries are left in place
    /// and nothing is recorded; the caller decides whether the lookup turns
    /// into a miss or a wait.
    pub fn fresh_value(&mut self, key: &CacheKey, ttl: Duration, now: Instant) -> Option<V>
    where
        V: Clone,
    {
        let value = self
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(ttl, now))
            .map(|entry| entry.value.clone())?;

        self.stats.record_hit();
        if self.max_entries.is_some() {
            self.lru.touch(key);
        }
        Some(value)
    }

    // == Insert ==
    /// Stores a freshly computed value, overwriting any previous entry.
    ///
    /// If the key is new and the table is at capacity, the least recently
    /// used entry is evicted first.
    pub fn insert(&mut self, key: CacheKey, value: V, now: Instant) {
        if let Some(max) = self.max_entries {
            if !self.entries.contains_key(&key) && self.entries.len() >= max {
                if let Some(evicted) = self.lru.evict_oldest() {
                    self.entries.remove(&evicted);
                    self.stats.record_eviction();
                }
            }
            self.lru.touch(&key);
        }

        self.entries.insert(key, CacheEntry::new(value, now));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Remove ==
    /// Removes the entry for `key`, returning whether one existed.
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.lru.remove(key);
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    /// Drops every stored entry. In-flight computations are unaffected.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
    }

    // == Purge Expired ==
    /// Removes all stale entries.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&mut self, ttl: Duration, now: Instant) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }

        self.stats.set_total_entries(self.entries.len());
        expired.len()
    }

    // == In-Flight Registry ==
    /// Registers the caller as leader for `key`, or hands back the signal of
    /// the computation already running.
    pub fn join_flight(&mut self, key: &CacheKey) -> FlightRole<V>
    where
        V: Clone,
    {
        if let Some(flight) = self.in_flight.get(key) {
            self.stats.record_coalesced();
            return FlightRole::Follow(flight.done.clone());
        }

        let (done_tx, done_rx) = oneshot::channel();
        let id = self.next_flight_id;
        self.next_flight_id = self.next_flight_id.wrapping_add(1);
        self.in_flight.insert(
            key.clone(),
            Flight {
                id,
                done: done_rx.shared(),
            },
        );
        self.stats.record_miss();

        FlightRole::Lead { id, done_tx }
    }

    /// Clears the in-flight marker for `key` if it still belongs to flight `id`.
    pub fn end_flight(&mut self, key: &CacheKey, id: u64) {
        if self.in_flight.get(key).is_some_and(|flight| flight.id == id) {
            self.in_flight.remove(key);
        }
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    // == Bookkeeping ==
    pub fn record_miss(&mut self) {
        self.stats.record_miss();
    }

    pub fn record_failure(&mut self) {
        self.stats.record_failure();
    }

    pub fn stats(&self) -> MemoStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn entry_info(&self, key: &CacheKey, ttl: Duration, now: Instant) -> Option<EntryInfo> {
        self.entries.get(key).map(|entry| entry.info(ttl, now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> fmt::Debug for CacheTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheTable")
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight.len())
            .field("max_entries", &self.max_entries)
            .field("stats", &self.stats)
            .finish()
    }
}
