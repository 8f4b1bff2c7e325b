//! Bounce detection.
//!
//! Pure correlation over four signal categories: a null sender, a
//! bounce-daemon sender pattern, a delivery-failure subject, and DSN marker
//! lines in the body. No single weak signal is sufficient on its own —
//! ordinary notification mail regularly matches one of them.

/// Sender substrings used by bounce daemons.
const DAEMON_PATTERNS: &[&str] = &["mailer-daemon", "mailerdaemon", "mail-daemon", "postmaster"];

/// Subject substrings that indicate a delivery failure.
const SUBJECT_PATTERNS: &[&str] = &[
    "undelivered",
    "undeliverable",
    "delivery status notification",
    "delivery failure",
    "delivery has failed",
    "failure notice",
    "returned mail",
    "mail delivery failed",
    "returned to sender",
];

/// Marker lines from the DSN (RFC 3464) machine-readable part.
const DSN_MARKERS: &[&str] = &[
    "final-recipient:",
    "original-recipient:",
    "reporting-mta:",
    "diagnostic-code:",
    "action: failed",
    "action: delayed",
];

/// Options for [`is_bounce`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BounceOptions<'a> {
    /// Envelope sender, when known. `None` means "judge from headers only";
    /// `Some("")` is a null return path — a strong bounce signal.
    pub envelope_from: Option<&'a str>,
    /// Strict mode raises the bar for the body-markers-only rule from two
    /// distinct markers to three.
    pub strict: bool,
}

/// Classify a message as a bounce/DSN.
///
/// Decision rule: bounce if (null sender AND any other signal), OR (enough
/// distinct body markers alone), OR (daemon sender AND subject-or-body
/// corroboration), OR (failure subject AND at least one body marker).
pub fn is_bounce(from: &str, subject: &str, text_body: &str, opts: &BounceOptions) -> bool {
    let from_lower = from.trim().to_lowercase();
    let envelope_lower = opts.envelope_from.map(|e| e.trim().to_lowercase());

    let null_sender = is_null_sender(&from_lower)
        || envelope_lower.as_deref().is_some_and(is_null_sender);

    let daemon_sender = DAEMON_PATTERNS.iter().any(|p| {
        from_lower.contains(p) || envelope_lower.as_deref().is_some_and(|e| e.contains(p))
    });

    let subject_lower = subject.to_lowercase();
    let subject_hit = SUBJECT_PATTERNS.iter().any(|p| subject_lower.contains(p));

    let body_lower = text_body.to_lowercase();
    let body_markers = DSN_MARKERS
        .iter()
        .filter(|m| body_lower.contains(*m))
        .count();

    let marker_threshold = if opts.strict { 3 } else { 2 };

    (null_sender && (daemon_sender || subject_hit || body_markers >= 1))
        || body_markers >= marker_threshold
        || (daemon_sender && (subject_hit || body_markers >= 1))
        || (subject_hit && body_markers >= 1)
}

fn is_null_sender(addr: &str) -> bool {
    addr.is_empty() || addr == "<>"
}
