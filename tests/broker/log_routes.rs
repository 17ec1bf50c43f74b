//! The `log` action over HTTP, binary RPC and the bus. gRPC lives in `grpc_routes`.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use sourced_broker::bus::{BusConnection, InMemoryBus};
use sourced_broker::{BrokerConfig, LogMessage, LogRoute, LOG_ROUTING_KEY};

use crate::support::{broker, mock_service, offline_config, post_json, rpc_logger};

fn log_request() -> serde_json::Value {
    json!({ "action": "log", "log": { "name": "event", "data": "user signed in" } })
}

#[tokio::test]
async fn http_route_posts_to_logger() {
    let (base, logger) = mock_service(202, json!({ "error": false, "message": "logged" })).await;
    let config = BrokerConfig {
        log_url: format!("{base}/log"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle/http", &log_request()).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "error": false, "message": "logged" }));
    assert_eq!(logger.bodies(), vec![json!({ "name": "event", "data": "user signed in" })]);
}

#[tokio::test]
async fn rpc_route_returns_remote_result() {
    let config = offline_config().await;
    let rpc_addr = rpc_logger(&config.rpc_method).await;
    let broker = broker(BrokerConfig { rpc_addr, ..config }, None);

    let (status, body) = post_json(broker, "/handle/rpc", &log_request()).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Processed payload via RPC: event");
}

#[tokio::test]
async fn default_route_is_rpc() {
    let config = offline_config().await;
    assert_eq!(config.log_route, LogRoute::Rpc);
    let rpc_addr = rpc_logger(&config.rpc_method).await;
    let broker = broker(BrokerConfig { rpc_addr, ..config }, None);

    let (status, body) = post_json(broker, "/handle", &log_request()).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Processed payload via RPC: event");
}

#[tokio::test]
async fn rpc_route_surfaces_dial_error() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_json(broker, "/handle/rpc", &log_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["message"].as_str().unwrap().starts_with("dial tcp"));
}

#[tokio::test]
async fn bus_route_publishes_json_log_message() {
    let bus = Arc::new(InMemoryBus::new());
    let broker = broker(offline_config().await, Some(Arc::clone(&bus)));

    let (status, body) = post_json(broker, "/handle/bus", &log_request()).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "error": false, "message": "logged via RabbitMQ" }));

    let published = bus.published_with_key(LOG_ROUTING_KEY);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].exchange, "logs_topic");
    let received: LogMessage = published[0].decode().unwrap();
    assert_eq!(
        received,
        LogMessage {
            name: "event".into(),
            data: "user signed in".into()
        }
    );
}

#[tokio::test]
async fn bus_route_fails_once_connection_drops() {
    let bus = Arc::new(InMemoryBus::new());
    let broker = broker(offline_config().await, Some(Arc::clone(&bus)));
    bus.close().await.unwrap();

    let (status, body) = post_json(broker, "/handle/bus", &log_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": true, "message": "bus not connected" }));
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn concurrent_bus_publishes_share_one_queue() {
    let bus = Arc::new(InMemoryBus::new());
    let broker = broker(offline_config().await, Some(Arc::clone(&bus)));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let broker = broker.clone();
        tasks.push(tokio::spawn(async move {
            post_json(broker, "/handle/bus", &log_request()).await
        }));
    }
    for task in tasks {
        let (status, _) = task.await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    assert_eq!(bus.published().len(), 8);
    // topology is declared once, however many requests race to publish
    assert_eq!(bus.queues().len(), 1);
    assert_eq!(bus.bindings().len(), 1);
    assert_eq!(bus.exchanges(), vec!["logs_topic".to_string()]);
}

#[cfg(not(feature = "grpc"))]
#[tokio::test]
async fn grpc_route_reports_disabled_transport() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_json(broker, "/handle/grpc", &log_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": true, "message": "grpc transport not enabled" }));
}
