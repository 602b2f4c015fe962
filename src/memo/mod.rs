//! Memo Module
//!
//! TTL memoization for async producers: key derivation, entry storage,
//! optional LRU bound and in-flight coalescing.

mod canonical;
mod entry;
mod key;
mod lru;
mod memoized;
mod stats;
mod table;


// Re-export public types
pub use canonical::to_canonical;
pub use entry::{CacheEntry, EntryInfo};
pub use key::{CacheKey, CallArgs};
pub use lru::LruTracker;
pub use memoized::{wrap, InFlightPolicy, Memoized, Producer, PurgeHandle, SharedTable};
pub use stats::MemoStats;
pub use table::{CacheTable, FlightRole, FlightSignal};

// == Public Constants ==
/// TTL applied when none is configured, in seconds
pub const DEFAULT_TTL_SECS: u64 = 300;
