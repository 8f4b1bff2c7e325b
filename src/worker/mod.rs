//! Worker system — the consumer process.
//!
//! Core components:
//! - `state` — lifecycle state machine (Starting → Running → Draining → Stopped)
//! - `counters` — process-lifetime counters + periodic reporter
//! - `processor` — per-entry pipeline (parse → decode → classify → deliver)
//! - `worker` — the dequeue loop tying it all together

pub mod counters;
pub mod processor;
pub mod state;
pub mod worker;

pub use counters::{Counters, CountersSnapshot};
pub use processor::{EntryProcessor, ProcessOutcome};
pub use state::WorkerState;
pub use worker::Worker;
