//! Cache Entry Module
//!
//! Defines stored results and the freshness rule.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

// == Cache Entry ==
/// A computed value together with when it was computed.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The producer's result
    pub value: V,
    /// Monotonic timestamp used for freshness checks
    pub computed_at: Instant,
    /// Wall-clock timestamp, for inspection only
    pub stored_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry stamped with the given monotonic time.
    pub fn new(value: V, computed_at: Instant) -> Self {
        Self {
            value,
            computed_at,
            stored_at: Utc::now(),
        }
    }

    // == Age ==
    /// Time elapsed since the value was computed.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.computed_at)
    }

    // == Is Fresh ==
    /// Checks whether the entry may still be served.
    ///
    /// Boundary condition: an entry whose age equals the TTL is still fresh.
    /// A zero TTL is never fresh, which turns caching off while keys are still
    /// derived.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        !ttl.is_zero() && self.age(now) <= ttl
    }

    // == Time To Live ==
    /// Remaining freshness window, zero once stale.
    pub fn ttl_remaining(&self, ttl: Duration, now: Instant) -> Duration {
        ttl.saturating_sub(self.age(now))
    }

    /// Snapshot of the entry metadata.
    pub fn info(&self, ttl: Duration, now: Instant) -> EntryInfo {
        EntryInfo {
            stored_at: self.stored_at,
            age: self.age(now),
            ttl_remaining: self.ttl_remaining(ttl, now),
            fresh: self.is_fresh(ttl, now),
        }
    }
}

// == Entry Info ==
/// Metadata about a stored entry, without the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub stored_at: DateTime<Utc>,
    pub age: Duration,
    /// Zero once stale
    pub ttl_remaining: Duration,
    pub fresh: bool,
}
