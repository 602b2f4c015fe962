//! Expiry Sweep Task
//!
//! Background task that periodically removes stale memoized entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::memo::PurgeHandle;

/// Spawns a background task that periodically purges stale entries.
///
/// The task only holds a weak reference to the table and stops by itself
/// once the wrapper and all of its clones are dropped.
///
/// # Arguments
/// * `handle` - Obtained from [`Memoized::purge_handle`](crate::memo::Memoized::purge_handle)
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can also be used to abort it.
///
/// # Example
/// ```ignore
/// let rates = wrap(fetch_exchange_rate, Duration::from_secs(60));
/// let sweep = spawn_sweep_task(rates.purge_handle(), Duration::from_secs(30));
/// // Later:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task<V>(handle: PurgeHandle<V>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "{}: starting expiry sweep every {:?}",
            handle.name(),
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            match handle.purge() {
                Some(0) => debug!("{}: sweep found no stale entries", handle.name()),
                Some(removed) => info!("{}: sweep removed {} stale entries", handle.name(), removed),
                None => {
                    debug!("{}: wrapper dropped, stopping sweep", handle.name());
                    break;
                }
            }
        }
    })
}
