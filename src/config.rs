//! Configuration Module
//!
//! Handles loading memoization settings from environment variables.

use std::env;
use std::time::Duration;

use crate::memo::{InFlightPolicy, DEFAULT_TTL_SECS};

/// Memoization parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoConfig {
    /// How long a computed value stays fresh
    pub ttl: Duration,
    /// Upper bound on stored entries, None = unbounded
    pub max_entries: Option<usize>,
    /// Behavior of concurrent misses on the same key
    pub in_flight: InFlightPolicy,
    /// Background purge interval, None = no background purge
    pub sweep_interval: Option<Duration>,
}

impl MemoConfig {
    /// Creates a new MemoConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_TTL_SECS` - TTL in seconds, fractions allowed (default: 300)
    /// - `MEMO_MAX_ENTRIES` - Maximum stored entries (default: unbounded)
    /// - `MEMO_COALESCE` - `true`/`1` to coalesce concurrent misses (default: false)
    /// - `MEMO_SWEEP_INTERVAL_SECS` - Purge frequency in seconds (default: disabled)
    pub fn from_env() -> Self {
        Self::from_env_or(Self::default())
    }

    /// Like [`from_env`](Self::from_env), but unset or invalid variables fall
    /// back to `defaults` instead of the crate defaults.
    pub fn from_env_or(defaults: Self) -> Self {
        Self {
            ttl: env::var("MEMO_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .unwrap_or(defaults.ttl),
            max_entries: env::var("MEMO_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.max_entries),
            in_flight: env::var("MEMO_COALESCE")
                .ok()
                .and_then(|v| parse_flag(&v))
                .map(|coalesce| {
                    if coalesce {
                        InFlightPolicy::Coalesce
                    } else {
                        InFlightPolicy::Duplicate
                    }
                })
                .unwrap_or(defaults.in_flight),
            sweep_interval: env::var("MEMO_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .or(defaults.sweep_interval),
        }
    }

    /// Same defaults with a different TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            ..Self::default()
        }
    }
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_entries: None,
            in_flight: InFlightPolicy::Duplicate,
            sweep_interval: None,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
