//! Service configuration, resolved once from the environment before the
//! worker starts.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Queue store connection string, e.g. `redis://127.0.0.1:6379`.
    pub queue_url: String,
    /// Name of the inbound queue list.
    pub queue_name: String,
    /// Name of the dead-letter queue list.
    pub dlq_name: String,
    /// Downstream delivery endpoint URL.
    pub endpoint: String,
    /// API key sent with every delivery call.
    pub api_key: SecretString,
    /// Maximum delivery attempts per message.
    pub max_attempts: u32,
    /// Base delay for exponential delivery backoff.
    pub base_delay: Duration,
    /// Include base64 attachment content in the payload.
    pub include_content: bool,
    /// Deliver bounce messages (flagged) instead of skipping them.
    pub forward_bounces: bool,
    /// Maximum decoded message size in bytes.
    pub max_message_size: usize,
    /// Blocking dequeue timeout; bounds how long a drain request waits.
    pub dequeue_timeout: Duration,
    /// Interval between counter reports.
    pub report_interval: Duration,
}

impl Config {
    /// Build config from `MAILHOOK_*` environment variables.
    ///
    /// The delivery endpoint and API key are required; everything else has
    /// a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let endpoint = require("MAILHOOK_ENDPOINT", "Set it to the downstream webhook URL")?;
        let api_key = require("MAILHOOK_API_KEY", "Set it to the downstream API key")?;

        let max_attempts: u32 = parse_var("MAILHOOK_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAILHOOK_MAX_ATTEMPTS".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            queue_url: std::env::var("MAILHOOK_QUEUE_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            queue_name: std::env::var("MAILHOOK_QUEUE")
                .unwrap_or_else(|_| "mail:inbound".to_string()),
            dlq_name: std::env::var("MAILHOOK_DLQ")
                .unwrap_or_else(|_| "mail:inbound:dead".to_string()),
            endpoint,
            api_key: SecretString::from(api_key),
            max_attempts,
            base_delay: Duration::from_millis(parse_var("MAILHOOK_BASE_DELAY_MS", 1000)?),
            include_content: parse_var("MAILHOOK_INCLUDE_CONTENT", false)?,
            forward_bounces: parse_var("MAILHOOK_FORWARD_BOUNCES", false)?,
            max_message_size: parse_var("MAILHOOK_MAX_MESSAGE_SIZE", 26_214_400)?,
            dequeue_timeout: Duration::from_secs(parse_var("MAILHOOK_DEQUEUE_TIMEOUT_SECS", 5)?),
            report_interval: Duration::from_secs(parse_var("MAILHOOK_REPORT_INTERVAL_SECS", 60)?),
        })
    }
}

fn require(key: &str, hint: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingRequired {
            key: key.into(),
            hint: hint.into(),
        }),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("could not parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
