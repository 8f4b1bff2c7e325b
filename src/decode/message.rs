//! Decoded message representation. Derived, never persisted.

use std::collections::BTreeMap;

/// A raw message after MIME decoding.
#[derive(Debug, Clone, Default)]
pub struct DecodedMessage {
    /// Sender display text, e.g. `Alice <alice@example.com>`.
    pub from: String,
    /// Recipient display texts.
    pub to: Vec<String>,
    /// Decoded subject.
    pub subject: String,
    /// Plain-text body, empty if the message carries none.
    pub text_body: String,
    /// HTML body, empty if the message carries none.
    pub html_body: String,
    /// Header mapping. First occurrence wins; key case preserved as
    /// received.
    pub headers: BTreeMap<String, String>,
    /// Decoded attachments in MIME order.
    pub attachments: Vec<DecodedAttachment>,
}

impl DecodedMessage {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded attachment part.
#[derive(Debug, Clone)]
pub struct DecodedAttachment {
    /// Filename as declared by the sender, if any.
    pub filename: Option<String>,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Decoded size in bytes.
    pub size: usize,
    /// Content-ID for inline references, if any.
    pub content_id: Option<String>,
    /// Decoded content bytes.
    pub content: Vec<u8>,
    /// Position among the message's attachments.
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut msg = DecodedMessage::default();
        msg.headers
            .insert("X-Spam-Status".into(), "No, score=0.1 required=5.0".into());
        assert!(msg.header("x-spam-status").is_some());
        assert!(msg.header("X-SPAM-STATUS").is_some());
        assert!(msg.header("X-Spam-Flag").is_none());
    }
}
