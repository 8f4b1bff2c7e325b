//! Retrying HTTP delivery to the downstream application.
//!
//! One pooled, keep-alive client amortizes connection setup across the high
//! volume of small requests. Every call carries the message identifier as
//! an idempotency hint so the receiver can de-duplicate after an ambiguous
//! failure.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::error::DeliveryError;
use crate::payload::DeliveryPayload;

/// Successful delivery receipt.
#[derive(Debug, Clone, Copy)]
pub struct Delivered {
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Client for the downstream delivery endpoint.
pub struct DeliveryClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    max_attempts: u32,
    base_delay: Duration,
}

impl DeliveryClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            max_attempts,
            base_delay,
        }
    }

    /// Deliver a payload, retrying transient failures with exponential
    /// backoff (`base_delay * 2^attempt`).
    ///
    /// A 4xx other than 429 is permanent and aborts immediately. Exhausting
    /// the attempt budget surfaces the last error.
    pub async fn deliver(&self, payload: &DeliveryPayload) -> Result<Delivered, DeliveryError> {
        let mut last = DeliveryError::Network("no attempts made".into());

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.base_delay * 2_u32.pow(attempt - 1);
                tracing::debug!(
                    id = %payload.message_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before redelivery"
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(payload).await {
                Ok(()) => return Ok(Delivered {
                    attempts: attempt + 1,
                }),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        id = %payload.message_id,
                        attempt = attempt + 1,
                        error = %err,
                        "Delivery attempt failed"
                    );
                    last = err;
                }
            }
        }

        Err(DeliveryError::Exhausted {
            attempts: self.max_attempts,
            last: Box::new(last),
        })
    }

    async fn attempt(&self, payload: &DeliveryPayload) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("X-Message-Id", &payload.message_id)
            .header("Idempotency-Key", &payload.message_id)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let code = status.as_u16();
        if status.is_client_error() && code != 429 {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect();
            return Err(DeliveryError::Permanent { status: code, body });
        }

        Err(DeliveryError::Upstream { status: code })
    }
}

// The retry contract is exercised end-to-end against a live local server in
// tests/delivery_retry.rs.
