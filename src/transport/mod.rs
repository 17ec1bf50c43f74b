//! Transport adapters — each turns a domain payload into one wire call and
//! its answer into a [`NormalizedResponse`](crate::payload::NormalizedResponse)
//! or a [`BrokerError`](crate::error::BrokerError).

pub mod http;
pub mod rpc;

#[cfg(feature = "grpc")]
pub mod grpc;

pub use http::ServiceClient;
pub use rpc::{RpcClient, RpcError, RpcPayload, RpcServer};

#[cfg(feature = "grpc")]
pub use grpc::LogClient;
