//! Background Tasks Module
//!
//! Contains background tasks that run alongside memoized wrappers.
//!
//! # Tasks
//! - Sweep: Removes expired entries at configured intervals

mod sweep;

pub use sweep::spawn_sweep_task;
