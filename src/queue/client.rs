//! Thin client for the Redis-backed queue store.
//!
//! Owns one connection, established lazily on first use. Concurrent callers
//! share a single in-flight connect attempt; whoever loses the race simply
//! awaits the winner's result. Reconnection after a dropped link is handled
//! by [`redis::aio::ConnectionManager`].
//!
//! One client per worker — the connection is multiplexed but a blocking
//! dequeue parks it, so the client is not meant to be shared.

use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::QueueError;

/// Client for the inbound queue and its dead-letter list.
pub struct QueueClient {
    url: String,
    conn: OnceCell<ConnectionManager>,
}

impl QueueClient {
    /// Create a client. No connection is made until first use.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            conn: OnceCell::new(),
        }
    }

    /// Get the shared connection, establishing it on first call.
    async fn connection(&self) -> Result<ConnectionManager, QueueError> {
        let manager = self
            .conn
            .get_or_try_init(|| async {
                tracing::info!(url = %self.url, "Connecting to queue store");
                let client = redis::Client::open(self.url.as_str())?;
                let manager = ConnectionManager::new(client).await?;
                tracing::info!("Queue store connected");
                Ok::<_, QueueError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    /// Serialize `payload` and push it to the tail of `queue`.
    pub async fn enqueue<T: Serialize>(&self, queue: &str, payload: &T) -> Result<(), QueueError> {
        let body = serde_json::to_string(payload)?;
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("RPUSH")
            .arg(queue)
            .arg(body)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Block up to `timeout` waiting for an entry at the head of `queue`.
    ///
    /// Returns `Ok(None)` on timeout — an empty queue is not an error.
    pub async fn dequeue(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<String>, QueueError> {
        let mut conn = self.connection().await?;
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(queue)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(popped.map(|(_list, value)| value))
    }

    /// Push a failed entry to the dead-letter queue.
    pub async fn enqueue_dlq<T: Serialize>(&self, dlq: &str, payload: &T) -> Result<(), QueueError> {
        self.enqueue(dlq, payload).await
    }
}
