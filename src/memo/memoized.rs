//! Memoized Wrapper Module
//!
//! Wraps an async producer and serves its results from a TTL cache.
//!
//! # Example
//! ```ignore
//! let rates = wrap(
//!     |(from, to): (String, String)| async move { fetch_rate(&from, &to).await },
//!     Duration::from_secs(60),
//! );
//! let first = rates.call(("EUR".into(), "USD".into())).await?;  // invokes producer
//! let second = rates.call(("EUR".into(), "USD".into())).await?; // served from cache
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::MemoConfig;
use crate::error::{MemoError, Result};
use crate::memo::{CacheKey, CacheTable, EntryInfo, FlightRole, FlightSignal, MemoStats};

/// Table shared by every clone of one wrapper.
pub type SharedTable<V> = Arc<Mutex<CacheTable<V>>>;

// == Producer ==
/// An async computation whose results can be cached.
///
/// Implemented for every `Fn(A) -> impl Future<Output = Result<V, E>>`, so
/// async closures and async fns can be wrapped directly.
pub trait Producer<A>: Send + Sync {
    type Output;
    type Error;

    fn produce(&self, args: A) -> BoxFuture<'static, std::result::Result<Self::Output, Self::Error>>;
}

impl<A, F, Fut, V, E> Producer<A> for F
where
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
{
    type Output = V;
    type Error = E;

    fn produce(&self, args: A) -> BoxFuture<'static, std::result::Result<V, E>> {
        self(args).boxed()
    }
}

// == In-Flight Policy ==
/// What happens when several callers miss on the same key at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InFlightPolicy {
    /// Every missing caller invokes the producer; the last write wins.
    #[default]
    Duplicate,
    /// The first missing caller computes and hands its value to everyone
    /// waiting on the same key. If the first caller fails or is cancelled,
    /// the waiters retry.
    Coalesce,
}

// == Wrap ==
/// Wraps `producer` in an unbounded cache whose entries stay fresh for `ttl`.
///
/// A zero `ttl` disables caching while keys are still derived.
pub fn wrap<A, P>(producer: P, ttl: Duration) -> Memoized<A, P>
where
    P: Producer<A>,
{
    Memoized::new(producer, ttl)
}

// == Memoized ==
/// A producer plus the table caching its results.
///
/// Clones share the same table.
pub struct Memoized<A, P: Producer<A>> {
    producer: Arc<P>,
    table: SharedTable<P::Output>,
    ttl: Duration,
    in_flight: InFlightPolicy,
    name: Cow<'static, str>,
    _args: PhantomData<fn(A)>,
}

enum Step<V> {
    Hit(V),
    Compute(Option<FlightGuard<V>>),
    Wait(FlightSignal<V>),
}

impl<A, P: Producer<A>> Memoized<A, P> {
    // == Constructors ==
    /// Creates an unbounded wrapper with the duplicate-work in-flight policy.
    pub fn new(producer: P, ttl: Duration) -> Self {
        Self {
            producer: Arc::new(producer),
            table: Arc::new(Mutex::new(CacheTable::new(None))),
            ttl,
            in_flight: InFlightPolicy::Duplicate,
            name: Cow::Borrowed("memoized"),
            _args: PhantomData,
        }
    }

    /// Creates a wrapper from a full configuration.
    ///
    /// The sweep interval is not applied here; see
    /// [`spawn_sweep_task`](crate::tasks::spawn_sweep_task).
    pub fn with_config(producer: P, config: &MemoConfig) -> Result<Self> {
        if config.max_entries == Some(0) {
            return Err(MemoError::InvalidConfig(
                "max_entries must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            producer: Arc::new(producer),
            table: Arc::new(Mutex::new(CacheTable::new(config.max_entries))),
            ttl: config.ttl,
            in_flight: config.in_flight,
            name: Cow::Borrowed("memoized"),
            _args: PhantomData,
        })
    }

    /// Sets the name used in log events.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    // == Accessors ==
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn in_flight_policy(&self) -> InFlightPolicy {
        self.in_flight
    }

    pub fn stats(&self) -> MemoStats {
        self.table.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    // == Maintenance ==
    /// Drops every stored entry.
    pub fn clear(&self) {
        self.table.lock().clear();
        debug!("{}: cache cleared", self.name);
    }

    /// Removes stale entries now, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.table.lock().purge_expired(self.ttl, Instant::now())
    }

    /// Weak handle for background purging that does not keep the table alive.
    pub fn purge_handle(&self) -> PurgeHandle<P::Output> {
        PurgeHandle {
            table: Arc::downgrade(&self.table),
            ttl: self.ttl,
            name: self.name.clone(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Step<P::Output>
    where
        P::Output: Clone,
    {
        let mut table = self.table.lock();

        if let Some(value) = table.fresh_value(key, self.ttl, Instant::now()) {
            return Step::Hit(value);
        }

        match self.in_flight {
            InFlightPolicy::Duplicate => {
                table.record_miss();
                Step::Compute(None)
            }
            InFlightPolicy::Coalesce => match table.join_flight(key) {
                FlightRole::Lead { id, done_tx } => Step::Compute(Some(FlightGuard {
                    table: Arc::clone(&self.table),
                    key: key.clone(),
                    id,
                    done_tx: Some(done_tx),
                })),
                FlightRole::Follow(signal) => Step::Wait(signal),
            },
        }
    }
}

impl<A, P> Memoized<A, P>
where
    A: Serialize,
    P: Producer<A>,
{
    // == Invalidate ==
    /// Removes the entry for `args`, returning whether one existed.
    pub fn invalidate(&self, args: &A) -> Result<bool> {
        let key = CacheKey::derive(args)?;
        Ok(self.table.lock().remove(&key))
    }

    /// Metadata of the entry stored for `args`, stale or not.
    pub fn entry_info(&self, args: &A) -> Result<Option<EntryInfo>> {
        let key = CacheKey::derive(args)?;
        Ok(self.table.lock().entry_info(&key, self.ttl, Instant::now()))
    }
}

impl<A, P> Memoized<A, P>
where
    A: Serialize,
    P: Producer<A>,
    P::Output: Clone,
    P::Error: From<MemoError>,
{
    // == Call ==
    /// Returns the cached result for `args`, or invokes the producer.
    ///
    /// A hit returns without awaiting anything. A miss awaits the producer
    /// once and stores its result. Producer errors are returned unchanged and
    /// leave the table untouched; so does dropping the returned future before
    /// the producer finishes.
    ///
    /// Under [`InFlightPolicy::Coalesce`] a caller that finds the key being
    /// computed waits for that computation and returns its value, even when
    /// the TTL is zero.
    pub async fn call(&self, args: A) -> std::result::Result<P::Output, P::Error> {
        let key = CacheKey::derive(&args)?;

        let mut flight = loop {
            match self.lookup(&key) {
                Step::Hit(value) => {
                    debug!("{}: cache hit for {}", self.name, key);
                    return Ok(value);
                }
                Step::Compute(flight) => break flight,
                Step::Wait(signal) => {
                    debug!("{}: waiting on in-flight computation for {}", self.name, key);
                    match signal.await {
                        Ok(value) => {
                            debug!("{}: took in-flight result for {}", self.name, key);
                            return Ok(value);
                        }
                        // Leader failed or was cancelled
                        Err(_) => continue,
                    }
                }
            }
        };

        debug!("{}: cache miss for {}, invoking producer", self.name, key);

        match self.producer.produce(args).await {
            Ok(value) => {
                self.table.lock().insert(key, value.clone(), Instant::now());
                if let Some(flight) = flight.as_mut() {
                    flight.complete(value.clone());
                }
                Ok(value)
            }
            Err(err) => {
                self.table.lock().record_failure();
                warn!("{}: producer failed for {}, nothing cached", self.name, key);
                Err(err)
            }
        }
    }
}

impl<A, P: Producer<A>> Clone for Memoized<A, P> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
            table: Arc::clone(&self.table),
            ttl: self.ttl,
            in_flight: self.in_flight,
            name: self.name.clone(),
            _args: PhantomData,
        }
    }
}

impl<A, P: Producer<A>> fmt::Debug for Memoized<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("in_flight", &self.in_flight)
            .field("table", &*self.table.lock())
            .finish()
    }
}

// == Flight Guard ==
/// Held by the caller computing a coalesced key.
///
/// `complete` hands the value to the waiters. Dropping the guard without
/// completing clears the in-flight marker and wakes them empty-handed, so a
/// failed, panicked or cancelled computation never strands anyone.
struct FlightGuard<V> {
    table: SharedTable<V>,
    key: CacheKey,
    id: u64,
    done_tx: Option<futures::channel::oneshot::Sender<V>>,
}

impl<V> FlightGuard<V> {
    fn complete(&mut self, value: V) {
        self.table.lock().end_flight(&self.key, self.id);
        if let Some(done_tx) = self.done_tx.take() {
            // Every waiter may already be gone
            let _ = done_tx.send(value);
        }
    }
}

impl<V> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        // The marker must be gone before `done_tx` is dropped and waiters wake
        self.table.lock().end_flight(&self.key, self.id);
    }
}

// == Purge Handle ==
/// Weak reference to a wrapper's table for periodic purging.
#[derive(Debug, Clone)]
pub struct PurgeHandle<V> {
    table: Weak<Mutex<CacheTable<V>>>,
    ttl: Duration,
    name: Cow<'static, str>,
}

impl<V> PurgeHandle<V> {
    /// Removes stale entries, or returns None once the wrapper is gone.
    pub fn purge(&self) -> Option<usize> {
        let table = self.table.upgrade()?;
        let removed = table.lock().purge_expired(self.ttl, Instant::now());
        Some(removed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
