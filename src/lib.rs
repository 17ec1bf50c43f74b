//! sourced_broker — one inbound action, dispatched over the transport its
//! backend speaks.
//!
//! - [`bus`] connects to the message bus at startup (with backoff) and
//!   publishes log events on a topic exchange.
//! - [`transport`] holds the HTTP, binary RPC and gRPC adapters.
//! - [`broker`] routes a decoded [`Action`] to one adapter and normalizes
//!   the result.
//! - [`http`] is the inbound axum surface.

pub mod broker;
pub mod bus;
pub mod config;
mod error;
pub mod http;
mod payload;
pub mod transport;

pub use broker::{Broker, DispatchResponse, LOG_ROUTING_KEY};
pub use config::{BrokerConfig, BusConfig, LogRoute};
pub use error::BrokerError;
pub use payload::{
    Action, AuthPayload, InboundRequest, LogMessage, MailPayload, NormalizedResponse,
    MAX_BODY_BYTES,
};
