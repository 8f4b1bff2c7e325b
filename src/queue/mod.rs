//! Durable queue: entry schema and store client.

pub mod client;
pub mod entry;

pub use client::QueueClient;
pub use entry::{DeadLetterEntry, FailureInfo, PeerInfo, QueueEntry, SpamVerdict};
