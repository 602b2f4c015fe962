//! ttl_memo - In-memory TTL memoization for async computations
//!
//! Wraps an async producer so repeated calls with equal arguments are served
//! from a per-wrapper cache until their TTL runs out.

pub mod config;
pub mod error;
pub mod memo;
pub mod tasks;

pub use config::MemoConfig;
pub use error::{MemoError, Result};
pub use memo::{wrap, CallArgs, InFlightPolicy, Memoized, Producer};
pub use tasks::spawn_sweep_task;
