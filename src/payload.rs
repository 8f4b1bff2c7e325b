//! The outbound representation sent downstream. Built fresh per message,
//! never persisted — failures persist as dead-letter entries instead.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::classify::{AttachmentInfo, AttachmentSummary, SpamSignal, SpamStatus};
use crate::decode::DecodedMessage;
use crate::queue::QueueEntry;

/// JSON body POSTed to the downstream application.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryPayload {
    pub message_id: String,
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub headers: BTreeMap<String, String>,
    pub spam_status: SpamStatus,
    pub spam_score: f64,
    pub spam_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spam_report: Option<String>,
    pub attachments: Vec<AttachmentInfo>,
    pub attachment_count: usize,
    pub has_attachments: bool,
    /// Decoded message size in bytes.
    pub size: usize,
    /// When the acceptance stage took the message, ISO-8601.
    pub timestamp: String,
    pub is_bounce: bool,
}

impl DeliveryPayload {
    /// Assemble the payload from the decoded message and its classifier
    /// outputs.
    pub fn assemble(
        entry: &QueueEntry,
        message: DecodedMessage,
        spam: SpamSignal,
        attachments: AttachmentSummary,
        size: usize,
        is_bounce: bool,
    ) -> Self {
        Self {
            message_id: entry.id.clone(),
            from: message.from,
            to: message.to,
            subject: message.subject,
            text: message.text_body,
            html: message.html_body,
            headers: message.headers,
            spam_status: spam.status,
            spam_score: spam.score,
            spam_threshold: spam.threshold,
            spam_report: spam.report,
            attachments: attachments.attachments,
            attachment_count: attachments.count,
            has_attachments: attachments.has_attachments,
            size,
            timestamp: entry.enqueued_at.to_rfc3339(),
            is_bounce,
        }
    }
}
