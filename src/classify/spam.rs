//! Spam-signal extraction.
//!
//! This core never scans content itself — it surfaces verdicts produced
//! elsewhere. Priority order: a transaction-scoped verdict from the
//! acceptance stage, then a connection-scoped one, then inference from the
//! scanner headers already present on the message.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::decode::DecodedMessage;
use crate::queue::SpamVerdict;

/// Default threshold reported when no verdict source is present.
const DEFAULT_THRESHOLD: f64 = 5.0;

/// `X-Spam-Status: Yes, score=7.5 required=5.0 tests=...`
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(yes|no)\b.*?score=(-?[0-9.]+).*?required=(-?[0-9.]+)").unwrap()
});

/// Spam disposition, mirroring the `X-Spam-Status` vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamStatus {
    Yes,
    No,
    Unknown,
}

/// Extracted spam signal, ready for the delivery payload.
#[derive(Debug, Clone, Serialize)]
pub struct SpamSignal {
    pub status: SpamStatus,
    pub score: f64,
    pub threshold: f64,
    /// Rule names from the verdict, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// The raw status header, when inference used it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_header: Option<String>,
}

impl Default for SpamSignal {
    fn default() -> Self {
        Self {
            status: SpamStatus::Unknown,
            score: 0.0,
            threshold: DEFAULT_THRESHOLD,
            report: None,
            status_header: None,
        }
    }
}

/// Extract the spam signal for a message.
pub fn extract(
    connection_notes: Option<&serde_json::Value>,
    transaction_notes: Option<&serde_json::Value>,
    message: &DecodedMessage,
) -> SpamSignal {
    if let Some(signal) = verdict_from_notes(transaction_notes) {
        return signal;
    }
    if let Some(signal) = verdict_from_notes(connection_notes) {
        return signal;
    }
    infer_from_headers(message)
}

fn verdict_from_notes(notes: Option<&serde_json::Value>) -> Option<SpamSignal> {
    let verdict: SpamVerdict =
        serde_json::from_value(notes?.get("spam")?.clone()).ok()?;
    Some(SpamSignal {
        // A passed check means the message was NOT judged spam.
        status: if verdict.passed {
            SpamStatus::No
        } else {
            SpamStatus::Yes
        },
        score: verdict.score,
        threshold: verdict.required,
        report: (!verdict.rules.is_empty()).then(|| verdict.rules.join(", ")),
        status_header: None,
    })
}

fn infer_from_headers(message: &DecodedMessage) -> SpamSignal {
    let Some(header) = message.header("X-Spam-Status") else {
        return SpamSignal::default();
    };

    let mut signal = SpamSignal {
        status_header: Some(header.to_string()),
        ..Default::default()
    };

    if let Some(caps) = STATUS_RE.captures(header) {
        signal.status = if caps[1].eq_ignore_ascii_case("yes") {
            SpamStatus::Yes
        } else {
            SpamStatus::No
        };
        signal.score = caps[2].parse().unwrap_or(0.0);
        signal.threshold = caps[3].parse().unwrap_or(DEFAULT_THRESHOLD);
    }

    // A dedicated numeric score header wins over the one embedded in the
    // status line.
    if let Some(score) = message
        .header("X-Spam-Score")
        .and_then(|s| s.trim().parse::<f64>().ok())
    {
        signal.score = score;
    }

    signal
}
