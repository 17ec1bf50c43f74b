//! Binary RPC transport — one named procedure per call over TCP.
//!
//! Frames are length-delimited (4-byte big-endian prefix) and carry
//! bitcode-encoded bodies:
//!
//! - request: `{ seq, method, args: { name, data } }`
//! - reply:   `{ seq, error, reply }` where `reply` is a plain string
//!
//! The client dials once per call and drops the connection when the call
//! returns, on every path. [`RpcServer`] speaks the same framing and is what
//! the logger side (and the test suite) runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use crate::payload::LogMessage;

/// Arguments of the log procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcPayload {
    pub name: String,
    pub data: String,
}

impl From<&LogMessage> for RpcPayload {
    fn from(entry: &LogMessage) -> Self {
        Self {
            name: entry.name.clone(),
            data: entry.data.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestFrame {
    seq: u64,
    method: String,
    args: RpcPayload,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReplyFrame {
    seq: u64,
    error: Option<String>,
    reply: String,
}

/// Error type for RPC calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The server could not be reached.
    #[error("dial tcp {addr}: {reason}")]
    Dial { addr: String, reason: String },
    /// Reading or writing a frame failed.
    #[error("rpc io: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be encoded or decoded.
    #[error("rpc codec: {0}")]
    Codec(String),
    /// The remote procedure returned an error; the text is passed through verbatim.
    #[error("{0}")]
    Remote(String),
    /// The server hung up before replying.
    #[error("rpc connection closed before reply")]
    Closed,
    /// The call did not finish within the client's timeout.
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<bitcode::Error> for RpcError {
    fn from(err: bitcode::Error) -> Self {
        RpcError::Codec(err.to_string())
    }
}

/// Client for a binary RPC server at a fixed `host:port`.
#[derive(Debug)]
pub struct RpcClient {
    addr: String,
    timeout: Duration,
    seq: AtomicU64,
}

impl RpcClient {
    /// Create a client. `timeout` bounds each call, dial included.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            seq: AtomicU64::new(0),
        }
    }

    /// The server address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Invoke `method` with `args` and return its string result.
    pub async fn call(&self, method: &str, args: RpcPayload) -> Result<String, RpcError> {
        tokio::time::timeout(self.timeout, self.call_once(method, args))
            .await
            .map_err(|_| RpcError::Timeout(self.timeout))?
    }

    async fn call_once(&self, method: &str, args: RpcPayload) -> Result<String, RpcError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RpcError::Dial {
                addr: self.addr.clone(),
                reason: e.to_string(),
            })?;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let request = RequestFrame {
            seq,
            method: method.to_string(),
            args,
        };
        framed.send(Bytes::from(bitcode::serialize(&request)?)).await?;

        let frame = framed.next().await.ok_or(RpcError::Closed)??;
        let reply: ReplyFrame = bitcode::deserialize(&frame)?;
        if reply.seq != seq {
            return Err(RpcError::Codec(format!(
                "reply for call {} answered call {}",
                reply.seq, seq
            )));
        }
        debug!(addr = %self.addr, method, seq, "rpc call returned");

        match reply.error {
            Some(message) => Err(RpcError::Remote(message)),
            None => Ok(reply.reply),
        }
    }
}

type Procedure = Box<dyn Fn(RpcPayload) -> Result<String, String> + Send + Sync>;

/// Server side of the binary RPC transport.
///
/// ## Example
///
/// ```ignore
/// let server = Arc::new(
///     RpcServer::new().method("RPCServer.LogInfo", |args| Ok(format!("Processed payload via RPC: {}", args.name)))
/// );
/// let listener = TcpListener::bind("0.0.0.0:5001").await?;
/// server.serve(listener).await?;
/// ```
#[derive(Default)]
pub struct RpcServer {
    procedures: HashMap<String, Procedure>,
}

impl RpcServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a procedure.
    ///
    /// Uses builder pattern — returns `self` for chaining.
    pub fn method<F>(mut self, name: &str, procedure: F) -> Self
    where
        F: Fn(RpcPayload) -> Result<String, String> + Send + Sync + 'static,
    {
        self.procedures.insert(name.to_string(), Box::new(procedure));
        self
    }

    /// List registered procedure names.
    pub fn methods(&self) -> Vec<&str> {
        self.procedures.keys().map(|s| s.as_str()).collect()
    }

    /// Accept connections forever, serving each on its own task.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), std::io::Error> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = server.serve_connection(stream).await {
                    warn!(%peer, error = %err, "rpc connection failed");
                }
            });
        }
    }

    async fn serve_connection(&self, stream: TcpStream) -> Result<(), RpcError> {
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        while let Some(frame) = framed.next().await {
            let request: RequestFrame = bitcode::deserialize(&frame?)?;
            let reply = self.invoke(request);
            framed.send(Bytes::from(bitcode::serialize(&reply)?)).await?;
        }
        Ok(())
    }

    fn invoke(&self, request: RequestFrame) -> ReplyFrame {
        let result = match self.procedures.get(&request.method) {
            Some(procedure) => procedure(request.args),
            None => Err(format!("rpc: can't find method {}", request.method)),
        };
        match result {
            Ok(reply) => ReplyFrame {
                seq: request.seq,
                error: None,
                reply,
            },
            Err(error) => ReplyFrame {
                seq: request.seq,
                error: Some(error),
                reply: String::new(),
            },
        }
    }
}
