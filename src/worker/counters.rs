//! Process-lifetime counters and their periodic reporter.
//!
//! Counters are owned by the worker and reset only on process restart. The
//! reporter runs on its own interval, independent of message traffic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

/// Counters over everything the worker has seen since start.
#[derive(Debug, Default)]
pub struct Counters {
    consumed: AtomicU64,
    delivered: AtomicU64,
    skipped_bounce: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    pub consumed: u64,
    pub delivered: u64,
    pub skipped_bounce: u64,
    pub retried: u64,
    pub failed: u64,
    pub dead_lettered: u64,
}

impl Counters {
    pub fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_bounce(&self) {
        self.skipped_bounce.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retries(&self, n: u64) {
        self.retried.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            consumed: self.consumed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            skipped_bounce: self.skipped_bounce.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// Spawn the periodic counter reporter.
///
/// Runs until the shutdown flag is set; the flag is the same draining flag
/// the worker watches, so the final report notes it.
pub fn spawn_reporter(
    counters: Arc<Counters>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = std::time::Instant::now();
        let mut tick = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the first report has
        // something to say.
        tick.tick().await;

        loop {
            tick.tick().await;

            let snap = counters.snapshot();
            let draining = shutdown.load(Ordering::Relaxed);
            tracing::info!(
                uptime_secs = started.elapsed().as_secs(),
                consumed = snap.consumed,
                delivered = snap.delivered,
                skipped_bounce = snap.skipped_bounce,
                retried = snap.retried,
                failed = snap.failed,
                dead_lettered = snap.dead_lettered,
                draining,
                "Worker counters"
            );

            if draining {
                return;
            }
        }
    })
}
