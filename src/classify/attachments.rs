//! Attachment extraction for the delivery payload.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::decode::DecodedMessage;

/// One attachment as delivered downstream.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    /// Base64 content, included only on request — most downstreams only
    /// want the metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Attachment section of the delivery payload.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentSummary {
    pub attachments: Vec<AttachmentInfo>,
    pub count: usize,
    pub has_attachments: bool,
}

/// Attachment metadata recorded by an upstream scanning stage, used when
/// full MIME attachments are unavailable.
#[derive(Debug, Deserialize)]
struct AttachmentHint {
    filename: Option<String>,
    content_type: Option<String>,
    #[serde(default)]
    size: usize,
}

/// Extract the attachment summary for a message.
///
/// The decoder's structured list is the primary source; scanner hints from
/// the transaction notes are the fallback.
pub fn extract(
    message: &DecodedMessage,
    scanner_hints: Option<&serde_json::Value>,
    include_content: bool,
) -> AttachmentSummary {
    let mut attachments: Vec<AttachmentInfo> = message
        .attachments
        .iter()
        .map(|att| AttachmentInfo {
            filename: att
                .filename
                .clone()
                .unwrap_or_else(|| format!("attachment_{}", att.index)),
            content_type: att
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            size: att.size,
            content_id: att.content_id.clone(),
            content: include_content.then(|| BASE64.encode(&att.content)),
        })
        .collect();

    if attachments.is_empty()
        && let Some(hints) = scanner_hints.and_then(|notes| notes.get("attachments"))
        && let Ok(hints) = serde_json::from_value::<Vec<AttachmentHint>>(hints.clone())
    {
        attachments = hints
            .into_iter()
            .enumerate()
            .map(|(index, hint)| AttachmentInfo {
                filename: hint
                    .filename
                    .unwrap_or_else(|| format!("attachment_{index}")),
                content_type: hint
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                size: hint.size,
                content_id: None,
                content: None,
            })
            .collect();
    }

    AttachmentSummary {
        count: attachments.len(),
        has_attachments: !attachments.is_empty(),
        attachments,
    }
}
