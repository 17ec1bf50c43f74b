//! Error types for broker dispatch.

use thiserror::Error;

use crate::bus::BusError;
use crate::transport::rpc::RpcError;

/// Error type for every dispatch path.
///
/// Each variant maps to an HTTP-style status via [`BrokerError::status_code`];
/// the `Display` text becomes the `message` of the normalized response.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Inbound body was malformed, oversized, carried more than one JSON
    /// value, or lacked the payload its action needs.
    #[error("{0}")]
    Decode(String),
    /// The action tag names nothing the broker knows how to route.
    #[error("unknown action")]
    UnknownAction(String),
    /// The downstream service could not be reached (refused, timed out).
    #[error("{0}")]
    Unreachable(String),
    /// The downstream service answered with an unexpected status.
    #[error("{0}")]
    Rejected(String),
    /// The authentication service refused the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Publishing to the message bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The binary RPC call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// The gRPC call failed or exceeded its deadline.
    #[error("{0}")]
    Grpc(String),
}

impl BrokerError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            BrokerError::Decode(_) => 400,
            BrokerError::UnknownAction(_) => 400,
            BrokerError::InvalidCredentials => 401,
            BrokerError::Unreachable(_) => 500,
            BrokerError::Rejected(_) => 500,
            BrokerError::Bus(_) => 500,
            BrokerError::Rpc(_) => 500,
            BrokerError::Grpc(_) => 500,
        }
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(err: serde_json::Error) -> Self {
        BrokerError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            BrokerError::Unreachable(err.to_string())
        } else if err.is_decode() {
            BrokerError::Rejected(format!("malformed downstream response: {}", err))
        } else {
            BrokerError::Unreachable(err.to_string())
        }
    }
}
