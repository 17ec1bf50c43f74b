//! Event emitter — publishes messages onto the log topic exchange.

use serde::Serialize;
use tracing::debug;

use super::{BusChannel, BusConnection, BusError};

/// Publishes messages on one topic exchange over its own channel.
///
/// Construction declares the exchange (durable, topic) and an exclusive,
/// auto-deleted queue bound to it. The queue lives as long as the
/// connection, so build one emitter per connection and share it. Publishing
/// is fire-and-forget: `push` returns once the bus has accepted the message.
///
/// ## Example
///
/// ```ignore
/// let emitter = EventEmitter::new(conn.as_ref(), "logs_topic", "log.*").await?;
/// emitter.push(r#"{"name":"event","data":"hello"}"#, "log.INFO").await?;
/// emitter.close().await?;
/// ```
pub struct EventEmitter<C: BusConnection> {
    channel: C::Channel,
    exchange: String,
    queue: String,
}

impl<C: BusConnection> EventEmitter<C> {
    /// Open a channel on `conn` and declare the exchange topology.
    ///
    /// Fails immediately with [`BusError::Unavailable`] if the connection is
    /// already closed.
    pub async fn new(conn: &C, exchange: &str, binding_key: &str) -> Result<Self, BusError> {
        if !conn.is_open() {
            return Err(BusError::Unavailable);
        }

        let channel = conn.create_channel().await?;
        channel.declare_topic_exchange(exchange).await?;
        let queue = channel.declare_private_queue().await?;
        channel.bind_queue(&queue, exchange, binding_key).await?;

        Ok(Self {
            channel,
            exchange: exchange.to_string(),
            queue,
        })
    }

    /// Publish `body` under `routing_key`.
    pub async fn push(&self, body: &str, routing_key: &str) -> Result<(), BusError> {
        self.channel
            .publish(&self.exchange, routing_key, body.as_bytes())
            .await?;
        debug!(exchange = %self.exchange, routing_key, bytes = body.len(), "pushed event");
        Ok(())
    }

    /// Serialize `message` to JSON and publish it under `routing_key`.
    pub async fn emit<T: Serialize>(&self, message: &T, routing_key: &str) -> Result<(), BusError> {
        let body = serde_json::to_string(message)
            .map_err(|e| BusError::SerializationFailed(e.to_string()))?;
        self.push(&body, routing_key).await
    }

    /// The exchange this emitter publishes on.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// The server-assigned name of this emitter's private queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close the emitter's channel.
    pub async fn close(self) -> Result<(), BusError> {
        self.channel.close().await
    }
}
