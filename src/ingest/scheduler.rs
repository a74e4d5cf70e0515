//! Background pull task.
//!
//! One task per process ticks on a fixed interval and refreshes the cache.
//! Ticks missed while a pull runs are skipped rather than queued, and a tick
//! that finds another pull in flight (e.g. one started by `/clear-cache`)
//! does nothing. Cancelling the task drops any pull before it reaches the
//! cache, so the current entry is never left half-written.

use crate::cache::FreshnessCache;
use crate::ingest::{PullSource, RefreshOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Spawn the pull loop. The first pull happens immediately.
pub fn spawn_pull_task(
    source: Arc<PullSource>,
    cache: Arc<FreshnessCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_pull_loop(source, cache, interval, cancel))
}

async fn run_pull_loop(
    source: Arc<PullSource>,
    cache: Arc<FreshnessCache>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = interval.as_secs(),
        base_url = %source.base_url(),
        library_id = %source.library_id(),
        "Pull task started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = source.refresh(&cache) => {
                if let RefreshOutcome::Updated { books } = outcome {
                    tracing::debug!(books, "Scheduled pull complete");
                }
            }
        }
    }

    tracing::info!("Pull task stopped");
}
