//! Core connection traits for the message bus.

use async_trait::async_trait;
use thiserror::Error;

/// Error type for bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// No live connection to publish on.
    #[error("bus not connected")]
    Unavailable,
    /// Dialing the bus failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// Every connection attempt at startup failed.
    #[error("gave up connecting to the bus after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    /// Opening or closing a channel failed.
    #[error("channel error: {0}")]
    Channel(String),
    /// Declaring the exchange or queue failed (topology mismatch).
    #[error("declare failed: {0}")]
    Topology(String),
    /// Serialization of the message body failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),
    /// The bus refused the publish or the connection dropped mid-publish.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// A process-wide connection to the bus.
///
/// Created once at startup by [`BusConnector`](super::BusConnector), shared
/// behind an `Arc`, closed on shutdown. Implementations must be safe to use
/// from concurrent requests; each publisher opens its own channel.
#[async_trait]
pub trait BusConnection: Send + Sync + 'static {
    type Channel: BusChannel;

    /// Open a new channel on this connection.
    async fn create_channel(&self) -> Result<Self::Channel, BusError>;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;

    /// Close the connection. Further channels fail with [`BusError::Unavailable`].
    async fn close(&self) -> Result<(), BusError>;
}

/// A channel (session) on a bus connection.
#[async_trait]
pub trait BusChannel: Send + Sync + 'static {
    /// Declare a durable topic exchange. Succeeds silently if it already
    /// exists with the same properties.
    async fn declare_topic_exchange(&self, name: &str) -> Result<(), BusError>;

    /// Declare an exclusive, auto-deleted, non-durable queue with a
    /// server-assigned name and return that name.
    async fn declare_private_queue(&self) -> Result<String, BusError>;

    /// Bind `queue` to `exchange` under `binding_key`.
    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str)
        -> Result<(), BusError>;

    /// Publish `body` on `exchange` under `routing_key`, without confirms.
    async fn publish(&self, exchange: &str, routing_key: &str, body: &[u8])
        -> Result<(), BusError>;

    /// Close the channel.
    async fn close(&self) -> Result<(), BusError>;
}

/// Opens connections to a bus URL.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Connection: BusConnection;

    async fn dial(&self, url: &str) -> Result<Self::Connection, BusError>;
}
