//! Per-entry processing: parse → decode → classify → assemble → deliver.
//!
//! The processor owns no queue I/O. It reports what happened as a
//! [`ProcessOutcome`] and the worker loop translates that into counter
//! updates and dead-letter writes, which keeps the failure paths in one
//! place.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::classify::{self, BounceOptions};
use crate::config::Config;
use crate::decode::MimeDecoder;
use crate::delivery::DeliveryClient;
use crate::error::{DecodeError, DeliveryError};
use crate::payload::DeliveryPayload;
use crate::queue::QueueEntry;

/// What processing one raw queue entry came to.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Payload accepted downstream.
    Delivered { id: String, attempts: u32 },
    /// Classified as a bounce and bounce forwarding is off.
    SkippedBounce { id: String },
    /// Structurally valid entry that could not be processed or delivered —
    /// park it on the DLQ with the error descriptor.
    DeadLetter {
        entry: Box<QueueEntry>,
        status: Option<u16>,
        message: String,
        attempts: u32,
    },
    /// The raw payload is not a queue entry. It cannot be meaningfully
    /// re-enqueued, so it is dropped with a diagnostic.
    Malformed { reason: String },
}

#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ProcessError {
    fn status(&self) -> Option<u16> {
        match self {
            Self::Decode(_) => None,
            Self::Delivery(e) => e.status(),
        }
    }

    fn attempts(&self) -> u32 {
        match self {
            Self::Delivery(DeliveryError::Exhausted { attempts, .. }) => *attempts,
            _ => 1,
        }
    }
}

/// Stateless pipeline from raw queue entry to delivered payload.
pub struct EntryProcessor {
    decoder: MimeDecoder,
    delivery: DeliveryClient,
    include_content: bool,
    forward_bounces: bool,
    max_message_size: usize,
}

impl EntryProcessor {
    pub fn new(decoder: MimeDecoder, delivery: DeliveryClient, config: &Config) -> Self {
        Self {
            decoder,
            delivery,
            include_content: config.include_content,
            forward_bounces: config.forward_bounces,
            max_message_size: config.max_message_size,
        }
    }

    /// Process one raw entry popped from the queue.
    pub async fn process(&self, raw_entry: &str) -> ProcessOutcome {
        let entry: QueueEntry = match serde_json::from_str(raw_entry) {
            Ok(entry) => entry,
            Err(e) => {
                return ProcessOutcome::Malformed {
                    reason: e.to_string(),
                };
            }
        };

        match self.handle(&entry).await {
            Ok(outcome) => outcome,
            Err(err) => ProcessOutcome::DeadLetter {
                status: err.status(),
                message: err.to_string(),
                attempts: err.attempts(),
                entry: Box::new(entry),
            },
        }
    }

    async fn handle(&self, entry: &QueueEntry) -> Result<ProcessOutcome, ProcessError> {
        // Producers may wrap the base64; transport whitespace is not data.
        let compact: String = entry
            .raw
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let raw_bytes = BASE64.decode(compact.as_bytes()).map_err(DecodeError::from)?;

        if raw_bytes.len() > self.max_message_size {
            return Err(DecodeError::TooLarge {
                size: raw_bytes.len(),
                limit: self.max_message_size,
            }
            .into());
        }

        let message = self.decoder.decode(&raw_bytes)?;

        let bounce = classify::is_bounce(
            &message.from,
            &message.subject,
            &message.text_body,
            &BounceOptions {
                envelope_from: Some(&entry.sender),
                strict: false,
            },
        );
        if bounce && !self.forward_bounces {
            return Ok(ProcessOutcome::SkippedBounce {
                id: entry.id.clone(),
            });
        }

        let spam = classify::spam::extract(entry.peer.notes.as_ref(), entry.notes.as_ref(), &message);
        let attachments =
            classify::attachments::extract(&message, entry.notes.as_ref(), self.include_content);

        let payload = DeliveryPayload::assemble(
            entry,
            message,
            spam,
            attachments,
            raw_bytes.len(),
            bounce,
        );

        let delivered = self.delivery.deliver(&payload).await?;
        Ok(ProcessOutcome::Delivered {
            id: entry.id.clone(),
            attempts: delivered.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            queue_url: "redis://127.0.0.1:6379".into(),
            queue_name: "q".into(),
            dlq_name: "q:dead".into(),
            endpoint: "http://127.0.0.1:9/hook".into(),
            api_key: SecretString::from("test-key"),
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            include_content: false,
            forward_bounces: false,
            max_message_size: 1024,
            dequeue_timeout: Duration::from_secs(1),
            report_interval: Duration::from_secs(60),
        }
    }

    fn processor(config: &Config) -> EntryProcessor {
        EntryProcessor::new(
            MimeDecoder::with_default_strategies(),
            DeliveryClient::new(
                &config.endpoint,
                config.api_key.clone(),
                config.max_attempts,
                config.base_delay,
            ),
            config,
        )
    }

    fn entry_json(raw_b64: &str) -> String {
        format!(
            r#"{{"version":1,"id":"m1","enqueued_at":"2026-08-07T12:00:00Z",
                "sender":"","recipients":["x@y.z"],"raw":"{raw_b64}"}}"#
        )
    }

    #[tokio::test]
    async fn malformed_entry_is_dropped_not_dead_lettered() {
        let config = test_config();
        let outcome = processor(&config).process("{not json").await;
        assert!(matches!(outcome, ProcessOutcome::Malformed { .. }));
    }

    #[tokio::test]
    async fn invalid_base64_dead_letters() {
        let config = test_config();
        let outcome = processor(&config).process(&entry_json("%%%not-base64%%%")).await;
        match outcome {
            ProcessOutcome::DeadLetter { status, entry, .. } => {
                assert_eq!(status, None);
                assert_eq!(entry.id, "m1");
            }
            other => panic!("expected dead letter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_message_dead_letters_before_decode() {
        let config = Config {
            max_message_size: 8,
            ..test_config()
        };
        // 24 bytes of message, well past the 8 byte limit.
        let raw = BASE64.encode(b"From: a@b.c\r\n\r\nbody text");
        let outcome = processor(&config).process(&entry_json(&raw)).await;
        match outcome {
            ProcessOutcome::DeadLetter { message, .. } => {
                assert!(message.contains("exceeds"), "unexpected message: {message}");
            }
            other => panic!("expected dead letter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounce_is_skipped_before_delivery() {
        // The endpoint is unreachable, so reaching delivery would fail;
        // a skipped bounce proves classification ran first.
        let config = test_config();
        let raw = BASE64.encode(
            b"From: mailer-daemon@mx.example.com\r\n\
Subject: Undelivered Mail Returned to Sender\r\n\
\r\n\
Final-Recipient: rfc822; gone@example.net\r\nAction: failed\r\n" as &[u8],
        );
        let outcome = processor(&config).process(&entry_json(&raw)).await;
        match outcome {
            ProcessOutcome::SkippedBounce { id } => assert_eq!(id, "m1"),
            other => panic!("expected skipped bounce, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_downstream_dead_letters() {
        let config = test_config();
        let raw = BASE64.encode(b"From: a@b.c\r\nSubject: hi\r\n\r\nhello\r\n" as &[u8]);
        let outcome = processor(&config).process(&entry_json(&raw)).await;
        match outcome {
            ProcessOutcome::DeadLetter { status, .. } => assert_eq!(status, None),
            other => panic!("expected dead letter, got {other:?}"),
        }
    }
}
