//! Error types for mailhook.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Queue store transport errors.
///
/// The client does not retry these itself — retry policy belongs to the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue store unreachable: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("Failed to serialize queue payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Message decoding errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Not a parseable message: {0}")]
    Parse(String),

    #[error("Raw payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

/// Downstream delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 4xx other than 429 — the downstream rejected the payload itself.
    /// Retrying cannot help.
    #[error("Downstream rejected payload with status {status}: {body}")]
    Permanent { status: u16, body: String },

    /// 5xx or 429 — the downstream may recover.
    #[error("Downstream returned status {status}")]
    Upstream { status: u16 },

    #[error("Delivery request failed: {0}")]
    Network(String),

    #[error("Delivery failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<DeliveryError>,
    },
}

impl DeliveryError {
    /// Numeric HTTP status, if this failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } | Self::Upstream { status } => Some(*status),
            Self::Network(_) => None,
            Self::Exhausted { last, .. } => last.status(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Permanent { .. } | Self::Exhausted { .. } => false,
            Self::Upstream { .. } | Self::Network(_) => true,
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
