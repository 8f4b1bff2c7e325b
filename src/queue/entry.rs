//! Queue entry schema.
//!
//! Entries are created once by the acceptance front end, serialized as JSON,
//! and are immutable from then on. The `id` is an opaque string that stays
//! stable across redeliveries of the same logical message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current queue entry schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// The unit stored in the inbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Schema version written by the producer.
    pub version: u32,
    /// Opaque message identifier, unique per message.
    pub id: String,
    /// When the acceptance stage enqueued the message.
    pub enqueued_at: DateTime<Utc>,
    /// Envelope sender address (may be empty for bounces).
    #[serde(default)]
    pub sender: String,
    /// Envelope recipient addresses, in RCPT order. Never empty.
    pub recipients: Vec<String>,
    /// Declared size in bytes. Advisory — producer-controlled.
    #[serde(default)]
    pub size: u64,
    /// Remote peer metadata captured at accept time.
    #[serde(default)]
    pub peer: PeerInfo,
    /// Protocol greeting negotiated with the peer (e.g. the EHLO name).
    #[serde(default)]
    pub greeting: Option<String>,
    /// Whether the transport was encrypted.
    #[serde(default)]
    pub encrypted: bool,
    /// Transaction-scoped notes from the acceptance stage. May carry a
    /// pre-computed spam verdict under `"spam"` and scanner attachment
    /// hints under `"attachments"`.
    #[serde(default)]
    pub notes: Option<serde_json::Value>,
    /// Raw message octets, base64-encoded.
    pub raw: String,
}

/// Remote peer metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Peer IP address as reported by the acceptance stage.
    #[serde(default)]
    pub ip: String,
    /// Hostname the peer reported for itself.
    #[serde(default)]
    pub hostname: String,
    /// Free-text connection info.
    #[serde(default)]
    pub info: Option<String>,
    /// Connection-scoped notes (same shape as transaction notes).
    #[serde(default)]
    pub notes: Option<serde_json::Value>,
}

/// Pre-computed spam-engine verdict, read from entry notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamVerdict {
    pub score: f64,
    pub required: f64,
    pub passed: bool,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// A failed entry parked on the dead-letter queue for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// When processing gave up on the entry.
    pub failed_at: DateTime<Utc>,
    /// What went wrong.
    pub error: FailureInfo,
    /// The original entry, unmodified.
    pub entry: QueueEntry,
}

/// Error descriptor attached to a dead-letter entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Numeric HTTP status, when the failure carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Human-readable failure description.
    pub message: String,
}

impl DeadLetterEntry {
    pub fn new(entry: QueueEntry, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            failed_at: Utc::now(),
            error: FailureInfo {
                status,
                message: message.into(),
            },
            entry,
        }
    }
}
