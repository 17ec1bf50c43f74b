//! Broker — routes a decoded action to its transport and normalizes the
//! outcome.
//!
//! | action | transport                                   |
//! |--------|---------------------------------------------|
//! | auth   | HTTP, authentication service                |
//! | log    | HTTP, binary RPC, bus or gRPC per [`LogRoute`] |
//! | mail   | HTTP, mail service                          |
//!
//! Every path ends in a [`DispatchResponse`]; downstream failures become
//! `{ error: true, message }` bodies and never escape as panics.
//!
//! ## Example
//!
//! ```ignore
//! let broker = Broker::new(BrokerConfig::default(), Some(conn))?;
//! let response = broker.handle(request, LogRoute::Rpc).await;
//! assert_eq!(response.status, 202);
//! ```

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::bus::{BusConnection, BusError, EventEmitter};
use crate::config::{BrokerConfig, LogRoute};
use crate::error::BrokerError;
use crate::payload::{Action, InboundRequest, LogMessage, NormalizedResponse};
use crate::transport::{RpcClient, RpcPayload, ServiceClient};

#[cfg(feature = "grpc")]
use crate::transport::LogClient;

/// Routing key log entries are published under.
pub const LOG_ROUTING_KEY: &str = "log.INFO";

/// Status returned on every successful dispatch.
pub const ACCEPTED: u16 = 202;

/// Response from dispatching an action.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Normalized body.
    pub body: NormalizedResponse,
}

impl DispatchResponse {
    fn accepted(body: NormalizedResponse) -> Self {
        Self {
            status: ACCEPTED,
            body,
        }
    }

    /// Turn an error into the failure shape every caller parses.
    pub fn failure(err: &BrokerError) -> Self {
        Self {
            status: err.status_code(),
            body: NormalizedResponse::from(err),
        }
    }
}

/// Routes actions to the authentication, logger and mail services.
///
/// Generic over `C`, the bus connection type. The connection is optional so
/// a broker without a bus still serves every non-bus route; bus routes then
/// fail fast with "bus not connected".
///
/// The exchange and the broker's private queue are declared once, by
/// [`Broker::declare_bus`] or on the first bus publish. Every later publish
/// reuses that emitter's channel.
pub struct Broker<C: BusConnection> {
    config: BrokerConfig,
    http: ServiceClient,
    rpc: RpcClient,
    #[cfg(feature = "grpc")]
    grpc: LogClient,
    bus: Option<Arc<C>>,
    emitter: OnceCell<EventEmitter<C>>,
}

impl<C: BusConnection> Broker<C> {
    /// Build a broker from configuration and a (shared) bus connection.
    pub fn new(config: BrokerConfig, bus: Option<Arc<C>>) -> Result<Self, BrokerError> {
        let http = ServiceClient::new(
            config.auth_url.clone(),
            config.log_url.clone(),
            config.mail_url.clone(),
            config.http_timeout,
        )?;
        let rpc = RpcClient::new(config.rpc_addr.clone(), config.rpc_timeout);

        Ok(Self {
            http,
            rpc,
            #[cfg(feature = "grpc")]
            grpc: LogClient::new(config.grpc_addr.clone(), config.grpc_deadline),
            bus,
            emitter: OnceCell::new(),
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Get the bus connection, if any.
    pub fn bus(&self) -> Option<&Arc<C>> {
        self.bus.as_ref()
    }

    /// Declare the log exchange and bind the broker's queue.
    ///
    /// Idempotent. Call at startup so a topology mismatch stops the process
    /// before it serves traffic.
    pub async fn declare_bus(&self) -> Result<&EventEmitter<C>, BusError> {
        let conn = self.bus.as_ref().ok_or(BusError::Unavailable)?;
        self.emitter
            .get_or_try_init(|| {
                EventEmitter::new(
                    conn.as_ref(),
                    &self.config.bus.exchange,
                    &self.config.bus.binding_key,
                )
            })
            .await
    }

    /// Decode an inbound request and dispatch it.
    pub async fn handle(&self, request: InboundRequest, route: LogRoute) -> DispatchResponse {
        match Action::try_from(request) {
            Ok(action) => self.dispatch(action, route).await,
            Err(err) => {
                warn!(error = %err, detail = ?err, "rejected inbound request");
                DispatchResponse::failure(&err)
            }
        }
    }

    /// Write the request's `log` payload over `route`, whatever its action tag.
    pub async fn handle_log(&self, request: InboundRequest, route: LogRoute) -> DispatchResponse {
        match request.log {
            Some(entry) => self.dispatch(Action::Log(entry), route).await,
            None => {
                let err = BrokerError::Decode("missing log payload".into());
                warn!(action = %request.action, error = %err, "rejected log request");
                DispatchResponse::failure(&err)
            }
        }
    }

    /// Dispatch a decoded action. `route` picks the transport for `log`.
    pub async fn dispatch(&self, action: Action, route: LogRoute) -> DispatchResponse {
        let name = action.name();
        let result = match &action {
            Action::Auth(credentials) => self.http.authenticate(credentials).await,
            Action::Log(entry) => self.log(entry, route).await,
            Action::Mail(mail) => self.http.send_mail(mail).await,
        };

        match result {
            Ok(body) => {
                info!(action = name, %route, "dispatched");
                DispatchResponse::accepted(body)
            }
            Err(err) => {
                warn!(action = name, %route, error = %err, "dispatch failed");
                DispatchResponse::failure(&err)
            }
        }
    }

    async fn log(&self, entry: &LogMessage, route: LogRoute) -> Result<NormalizedResponse, BrokerError> {
        match route {
            LogRoute::Http => self.http.write_log(entry).await,
            LogRoute::Rpc => {
                let reply = self
                    .rpc
                    .call(&self.config.rpc_method, RpcPayload::from(entry))
                    .await?;
                Ok(NormalizedResponse::ok(reply))
            }
            LogRoute::Bus => {
                self.publish_log(entry).await?;
                Ok(NormalizedResponse::ok("logged via RabbitMQ"))
            }
            LogRoute::Grpc => self.log_via_grpc(entry).await,
        }
    }

    async fn publish_log(&self, entry: &LogMessage) -> Result<(), BusError> {
        match &self.bus {
            Some(conn) if conn.is_open() => {}
            _ => return Err(BusError::Unavailable),
        }
        self.declare_bus().await?.emit(entry, LOG_ROUTING_KEY).await
    }

    #[cfg(feature = "grpc")]
    async fn log_via_grpc(&self, entry: &LogMessage) -> Result<NormalizedResponse, BrokerError> {
        self.grpc.write_log(entry).await?;
        Ok(NormalizedResponse::ok("logged"))
    }

    #[cfg(not(feature = "grpc"))]
    async fn log_via_grpc(&self, _entry: &LogMessage) -> Result<NormalizedResponse, BrokerError> {
        Err(BrokerError::Grpc("grpc transport not enabled".into()))
    }
}
