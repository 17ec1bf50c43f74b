//! Message bus — connection, retry and publishing.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               BusConnector (once, at startup)               │
//! │  - dials with n² second backoff, 6 attempts                 │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ Arc<Connection>
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              EventEmitter (one per broker)                  │
//! │  - one channel, durable topic exchange, private queue       │
//! │  - push(body, routing_key)                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!     ┌─────────────────┐         ┌─────────────────┐
//!     │ AmqpConnection  │         │   InMemoryBus   │
//!     │    (lapin)      │         │    (tests)      │
//!     └─────────────────┘         └─────────────────┘
//! ```

mod connection;
mod connector;
mod emitter;
mod in_memory;

#[cfg(feature = "amqp")]
mod amqp;

pub use connection::{BusChannel, BusConnection, BusError, Dialer};
pub use connector::{BusConnector, DEFAULT_MAX_ATTEMPTS};
pub use emitter::EventEmitter;
pub use in_memory::{InMemoryBus, InMemoryChannel, Published};

#[cfg(feature = "amqp")]
pub use amqp::{AmqpChannel, AmqpConnection, AmqpDialer};
