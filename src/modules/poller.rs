//! Polling loop that drives the pipeline over watchlist batches.

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::modules::pipeline::{process_batch, PipelineDeps};
use crate::utils::allium::MAX_ADDRESSES_PER_BATCH;

/// Pause between consecutive batches within one cycle, to stay friendly to
/// upstream rate limits when processing sequentially.
const INTER_BATCH_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Serialize)]
pub struct PollerStats {
    pub cycles_completed: u64,
    pub alerts_sent: u64,
    pub batches_failed: u64,
    pub watched_addresses: usize,
    pub batches_per_cycle: usize,
    pub is_running: bool,
}

/// Long-lived polling task. One cycle fetches every batch sequentially,
/// isolating per-batch failures, then sleeps the poll interval.
pub struct Poller {
    deps: Arc<PipelineDeps>,
    poll_interval: Duration,
    lookback: ChronoDuration,
    is_running: Arc<AtomicBool>,
    cycles_completed: Arc<AtomicU64>,
    alerts_sent: Arc<AtomicU64>,
    batches_failed: Arc<AtomicU64>,
}

impl Poller {
    pub fn new(deps: Arc<PipelineDeps>, poll_interval: Duration, lookback: ChronoDuration) -> Self {
        Self {
            deps,
            poll_interval,
            lookback,
            is_running: Arc::new(AtomicBool::new(false)),
            cycles_completed: Arc::new(AtomicU64::new(0)),
            alerts_sent: Arc::new(AtomicU64::new(0)),
            batches_failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Spawn the polling loop. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            warn!(target: "POLLER", "Already running");
            return;
        }

        // Bitcoin is excluded: the wallet transactions API does not
        // reliably support it and its transfers are outside alerting scope.
        let batches = self
            .deps
            .watchlist
            .batches(MAX_ADDRESSES_PER_BATCH, &["bitcoin"]);
        info!(
            target: "POLLER",
            "Polling {} addresses in {} batches",
            self.deps.watchlist.total_addresses(),
            batches.len()
        );

        let deps = Arc::clone(&self.deps);
        let is_running = Arc::clone(&self.is_running);
        let cycles_completed = Arc::clone(&self.cycles_completed);
        let alerts_sent = Arc::clone(&self.alerts_sent);
        let batches_failed = Arc::clone(&self.batches_failed);
        let poll_interval = self.poll_interval;
        let lookback = self.lookback;

        tokio::spawn(async move {
            while is_running.load(Ordering::SeqCst) {
                let mut total_sent = 0usize;

                for (i, batch) in batches.iter().enumerate() {
                    if !is_running.load(Ordering::SeqCst) {
                        break;
                    }
                    match process_batch(&deps, batch, lookback).await {
                        Ok(sent) => total_sent += sent,
                        Err(e) => {
                            // One bad batch never takes down the cycle.
                            batches_failed.fetch_add(1, Ordering::SeqCst);
                            deps.metrics.batches_failed.inc();
                            error!(
                                target: "POLLER",
                                "Batch {}/{} failed: {:#}",
                                i + 1,
                                batches.len(),
                                e
                            );
                        }
                    }
                    sleep(INTER_BATCH_DELAY).await;
                }

                alerts_sent.fetch_add(total_sent as u64, Ordering::SeqCst);
                cycles_completed.fetch_add(1, Ordering::SeqCst);
                deps.metrics.poll_cycles.inc();
                info!(
                    target: "POLLER",
                    "Cycle complete: {} alerts sent. Sleeping {}s.",
                    total_sent,
                    poll_interval.as_secs()
                );
                sleep(poll_interval).await;
            }
            info!(target: "POLLER", "Poller stopped");
        });
    }

    /// Cooperative stop; the loop exits at the next check.
    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
        info!(target: "POLLER", "Poller stopping...");
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn get_stats(&self) -> PollerStats {
        PollerStats {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            alerts_sent: self.alerts_sent.load(Ordering::SeqCst),
            batches_failed: self.batches_failed.load(Ordering::SeqCst),
            watched_addresses: self.deps.watchlist.total_addresses(),
            batches_per_cycle: self
                .deps
                .watchlist
                .batches(MAX_ADDRESSES_PER_BATCH, &["bitcoin"])
                .len(),
            is_running: self.is_running(),
        }
    }
}
