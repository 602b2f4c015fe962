//! ttl_memo demo - memoized exchange-rate lookups
//!
//! Wraps a slow async rate lookup in a TTL cache and shows which calls are
//! served from the cache.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_memo::{spawn_sweep_task, MemoConfig, Memoized};

/// Simulated upstream latency
const LOOKUP_DELAY: Duration = Duration::from_secs(2);

/// Rates stay valid for a minute unless MEMO_TTL_SECS says otherwise
const RATE_TTL: Duration = Duration::from_secs(60);

/// Pretends to call a remote rates API.
async fn fetch_exchange_rate((from, to): (String, String)) -> anyhow::Result<f64> {
    tokio::time::sleep(LOOKUP_DELAY).await;

    match (from.as_str(), to.as_str()) {
        ("EUR", "USD") => Ok(1.18),
        ("EUR", "GBP") => Ok(0.88),
        ("GBP", "USD") => Ok(1.32),
        _ => anyhow::bail!("no rate available for {}->{}", from, to),
    }
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Wrap the rate lookup and start the optional sweep task
/// 4. Run a miss, a hit and a second miss, then report statistics
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_memo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MemoConfig::from_env_or(MemoConfig::with_ttl(RATE_TTL));
    info!(
        "Configuration loaded: ttl={:?}, max_entries={:?}, in_flight={:?}, sweep_interval={:?}",
        config.ttl, config.max_entries, config.in_flight, config.sweep_interval
    );

    let rates = Memoized::with_config(fetch_exchange_rate, &config)
        .context("invalid memoization settings")?
        .named("fetch_exchange_rate");

    let sweep = config
        .sweep_interval
        .map(|interval| spawn_sweep_task(rates.purge_handle(), interval));

    for (from, to) in [("EUR", "USD"), ("EUR", "USD"), ("EUR", "GBP")] {
        let started = Instant::now();
        let rate = rates.call((from.to_string(), to.to_string())).await?;
        info!(
            "Rate {}->{}: {} ({:.3}s)",
            from,
            to,
            rate,
            started.elapsed().as_secs_f64()
        );
    }

    let stats = rates.stats();
    info!(
        "Cache stats: hits={}, misses={}, entries={}, hit_rate={:.2}",
        stats.hits,
        stats.misses,
        stats.total_entries,
        stats.hit_rate()
    );

    if let Some(sweep) = sweep {
        sweep.abort();
    }

    Ok(())
}
