//! Inbound HTTP transport — maps HTTP requests to broker dispatch.
//!
//! Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /` — broker ping, `{ "error": false, "message": "Hit the broker" }`.
//! - `GET /ping` — heartbeat.
//! - `POST /handle` — dispatch, `log` goes over the configured default route.
//! - `POST /handle/:route` — dispatch, `log` goes over `http`, `rpc`, `bus` or `grpc`.
//! - `POST /log-grpc` — write the `log` payload over gRPC, whatever the action tag.
//!
//! Bodies are capped at 1 MiB and must hold exactly one JSON value. Every
//! response body has the normalized `{ error, message, data? }` shape.
//!
//! ## Example
//!
//! ```ignore
//! let broker = Arc::new(Broker::new(config, Some(conn))?);
//!
//! // Get the router to compose with other axum routes
//! let app = sourced_broker::http::router(broker.clone());
//!
//! // Or serve directly
//! sourced_broker::http::serve(broker, "0.0.0.0:80", shutdown_signal()).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broker::{Broker, DispatchResponse};
use crate::bus::BusConnection;
use crate::config::LogRoute;
use crate::error::BrokerError;
use crate::payload::{InboundRequest, NormalizedResponse, MAX_BODY_BYTES};

/// Build an axum `Router` that dispatches through the given broker.
pub fn router<C: BusConnection>(broker: Arc<Broker<C>>) -> Router {
    Router::new()
        .route("/", post(broker_handler))
        .route("/ping", get(heartbeat_handler))
        .route("/handle", post(handle_default::<C>))
        .route("/handle/:route", post(handle_route::<C>))
        .route("/log-grpc", post(handle_grpc::<C>))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

/// Serve the broker over HTTP at the given address until `shutdown` resolves.
pub async fn serve<C, F>(broker: Arc<Broker<C>>, addr: &str, shutdown: F) -> Result<(), std::io::Error>
where
    C: BusConnection,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(broker);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "broker listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Browsers on any http/https origin may call the broker with credentials.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            let origin = origin.as_bytes();
            origin.starts_with(b"https://") || origin.starts_with(b"http://")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([header::LINK])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

/// `POST /` — liveness ping in the normalized shape.
async fn broker_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(NormalizedResponse::ok("Hit the broker")))
}

/// `GET /ping` — heartbeat.
async fn heartbeat_handler() -> impl IntoResponse {
    (StatusCode::OK, ".")
}

/// `POST /handle`
async fn handle_default<C: BusConnection>(
    State(broker): State<Arc<Broker<C>>>,
    body: Body,
) -> Response {
    let route = broker.config().log_route;
    handle(&broker, body, route).await
}

/// `POST /handle/:route`
async fn handle_route<C: BusConnection>(
    State(broker): State<Arc<Broker<C>>>,
    Path(route): Path<String>,
    body: Body,
) -> Response {
    match route.parse::<LogRoute>() {
        Ok(route) => handle(&broker, body, route).await,
        Err(msg) => respond(DispatchResponse::failure(&BrokerError::Decode(msg))),
    }
}

/// `POST /log-grpc` — only the `log` payload is read; the action tag is ignored.
async fn handle_grpc<C: BusConnection>(
    State(broker): State<Arc<Broker<C>>>,
    body: Body,
) -> Response {
    match read_request(body).await {
        Ok(request) => respond(broker.handle_log(request, LogRoute::Grpc).await),
        Err(err) => respond(DispatchResponse::failure(&err)),
    }
}

async fn handle<C: BusConnection>(broker: &Broker<C>, body: Body, route: LogRoute) -> Response {
    let request = match read_request(body).await {
        Ok(request) => request,
        Err(err) => return respond(DispatchResponse::failure(&err)),
    };
    respond(broker.handle(request, route).await)
}

/// Read at most [`MAX_BODY_BYTES`] and decode exactly one JSON value.
async fn read_request(body: Body) -> Result<InboundRequest, BrokerError> {
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| BrokerError::Decode(format!("request body too large or unreadable: {}", e)))?;
    InboundRequest::from_slice(&bytes)
}

fn respond(response: DispatchResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}
