//! The consumer loop.
//!
//! Single-threaded and cooperative: one message is mid-flight at a time,
//! and the queue's atomic pop is what partitions work when more worker
//! processes are added. Shutdown sets a flag; the in-flight cycle finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::Config;
use crate::error::Error;
use crate::queue::{DeadLetterEntry, QueueClient};
use crate::worker::counters::{self, Counters};
use crate::worker::processor::{EntryProcessor, ProcessOutcome};
use crate::worker::state::WorkerState;

/// Pause after a dequeue transport error before trying again.
const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// The queue consumer.
pub struct Worker {
    config: Config,
    queue: QueueClient,
    processor: EntryProcessor,
    counters: Arc<Counters>,
    state: WorkerState,
    draining: Arc<AtomicBool>,
}

impl Worker {
    /// Create a worker in the `Starting` state. The draining flag is shared
    /// with the signal handler that requests shutdown.
    pub fn new(
        config: Config,
        queue: QueueClient,
        processor: EntryProcessor,
        draining: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            queue,
            processor,
            counters: Arc::new(Counters::default()),
            state: WorkerState::Starting,
            draining,
        }
    }

    /// Counters handle for observers.
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    fn transition(&mut self, target: WorkerState) {
        if self.state.can_transition_to(target) {
            tracing::info!(from = %self.state, to = %target, "Worker state change");
            self.state = target;
        } else {
            tracing::warn!(from = %self.state, to = %target, "Invalid worker state change ignored");
        }
    }

    /// Run until a termination signal drains the loop.
    ///
    /// Configuration was validated before construction, so the worker goes
    /// straight to `Running`. The dequeue timeout bounds how long a drain
    /// request waits when the queue is idle.
    pub async fn run(mut self) -> Result<(), Error> {
        self.transition(WorkerState::Running);

        let reporter = counters::spawn_reporter(
            Arc::clone(&self.counters),
            self.config.report_interval,
            Arc::clone(&self.draining),
        );

        loop {
            if self.draining.load(Ordering::Relaxed) {
                self.transition(WorkerState::Draining);
                break;
            }

            match self
                .queue
                .dequeue(&self.config.queue_name, self.config.dequeue_timeout)
                .await
            {
                Ok(Some(raw)) => self.handle_entry(&raw).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Dequeue failed");
                    tokio::time::sleep(DEQUEUE_ERROR_BACKOFF).await;
                }
            }
        }

        self.transition(WorkerState::Stopped);
        reporter.abort();
        let snap = self.counters.snapshot();
        tracing::info!(
            consumed = snap.consumed,
            delivered = snap.delivered,
            dead_lettered = snap.dead_lettered,
            "Worker stopped"
        );
        Ok(())
    }

    async fn handle_entry(&self, raw: &str) {
        self.counters.record_consumed();

        match self.processor.process(raw).await {
            ProcessOutcome::Delivered { id, attempts } => {
                self.counters.record_delivered();
                self.counters.record_retries(u64::from(attempts - 1));
                tracing::info!(id = %id, attempts, "Delivered");
            }
            ProcessOutcome::SkippedBounce { id } => {
                self.counters.record_skipped_bounce();
                tracing::info!(id = %id, "Skipped bounce");
            }
            ProcessOutcome::DeadLetter {
                entry,
                status,
                message,
                attempts,
            } => {
                self.counters.record_retries(u64::from(attempts.saturating_sub(1)));
                tracing::error!(id = %entry.id, status = ?status, error = %message, "Dead-lettering entry");
                let dle = DeadLetterEntry::new(*entry, status, message);
                match self
                    .queue
                    .enqueue_dlq(&self.config.dlq_name, &dle)
                    .await
                {
                    Ok(()) => self.counters.record_dead_lettered(),
                    Err(e) => {
                        // The entry is lost if this fails; nothing further
                        // to park it on.
                        self.counters.record_failed();
                        tracing::error!(id = %dle.entry.id, error = %e, "DLQ write failed");
                    }
                }
            }
            ProcessOutcome::Malformed { reason } => {
                self.counters.record_failed();
                tracing::warn!(error = %reason, "Dropping malformed queue entry");
            }
        }
    }
}
