//! gRPC transport for log entries.
//!
//! Requires the `grpc` feature. Uses tonic for the channel and prost for
//! message serialization (standard protobuf wire format, no `.proto` file).
//!
//! ## RPCs
//!
//! - `broker.logs.LogService/WriteLog` — input `LogRequest`, output `LogResponse`.
//!
//! The client opens a plaintext HTTP/2 channel per call, which is only
//! acceptable on a trusted internal network, and drops it when the call
//! returns.

use std::time::Duration;

use tonic::transport::Endpoint;
use tonic::{Code, Request};
use tracing::debug;

use crate::error::BrokerError;
use crate::payload::LogMessage;

// ---------------------------------------------------------------------------
// Message types (prost — standard protobuf wire format)
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub data: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogRequest {
    #[prost(message, optional, tag = "1")]
    pub log_entry: Option<Log>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogResponse {
    #[prost(string, tag = "1")]
    pub result: String,
}

impl From<&LogMessage> for Log {
    fn from(entry: &LogMessage) -> Self {
        Self {
            name: entry.name.clone(),
            data: entry.data.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated service trait + server/client
// ---------------------------------------------------------------------------

include!(concat!(env!("OUT_DIR"), "/broker.logs.LogService.rs"));

pub use log_service_client::LogServiceClient;
pub use log_service_server::{LogService, LogServiceServer};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Per-call gRPC client for the logger.
#[derive(Debug, Clone)]
pub struct LogClient {
    addr: String,
    deadline: Duration,
}

impl LogClient {
    /// `addr` is `host:port`; `deadline` bounds connect plus call.
    pub fn new(addr: impl Into<String>, deadline: Duration) -> Self {
        Self {
            addr: addr.into(),
            deadline,
        }
    }

    /// Write one log entry and return the logger's result string.
    ///
    /// The deadline covers dialing and the call together.
    pub async fn write_log(&self, entry: &LogMessage) -> Result<String, BrokerError> {
        tokio::time::timeout(self.deadline, self.write_log_once(entry))
            .await
            .map_err(|_| BrokerError::Grpc("context deadline exceeded".into()))?
    }

    async fn write_log_once(&self, entry: &LogMessage) -> Result<String, BrokerError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.addr))
            .map_err(|e| BrokerError::Grpc(e.to_string()))?
            .connect_timeout(self.deadline);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| BrokerError::Unreachable(format!("grpc dial {}: {}", self.addr, e)))?;

        let mut client = LogServiceClient::new(channel);
        let request = Request::new(LogRequest {
            log_entry: Some(Log::from(entry)),
        });

        let response = client.write_log(request).await.map_err(|status| {
            if status.code() == Code::DeadlineExceeded {
                BrokerError::Grpc("context deadline exceeded".into())
            } else {
                BrokerError::Grpc(status.message().to_string())
            }
        })?;
        debug!(addr = %self.addr, name = %entry.name, "grpc log written");
        Ok(response.into_inner().result)
    }
}
