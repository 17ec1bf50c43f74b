//! Inbound surface: ping routes and request decoding.

use axum::http::StatusCode;
use serde_json::json;
use sourced_broker::{BrokerConfig, MAX_BODY_BYTES};

use crate::support::{broker, mock_service, offline_config, post_json, post_raw};

#[tokio::test]
async fn broker_ping() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_raw(broker, "/", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "error": false, "message": "Hit the broker" }));
}

#[tokio::test]
async fn heartbeat() {
    use tower::ServiceExt;

    let broker = broker(offline_config().await, None);
    let app = sourced_broker::http::router(broker);
    let request = axum::http::Request::builder()
        .uri("/ping")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_action_is_rejected_without_downstream_call() {
    let (mail_base, mail) = mock_service(202, json!({ "error": false, "message": "sent" })).await;
    let config = sourced_broker::BrokerConfig {
        mail_url: format!("{mail_base}/send"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &json!({ "action": "shout" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": true, "message": "unknown action" }));
    assert_eq!(mail.hits(), 0);
}

#[tokio::test]
async fn two_json_values_are_rejected_before_dispatch() {
    let (mail_base, mail) = mock_service(202, json!({ "error": false, "message": "sent" })).await;
    let config = sourced_broker::BrokerConfig {
        mail_url: format!("{mail_base}/send"),
        ..offline_config().await
    };
    let broker = broker(config, None);
    let one = json!({
        "action": "mail",
        "mail": { "from": "a@example.com", "to": "b@example.com", "subject": "s", "message": "m" }
    });
    let body = format!("{one}{one}");

    let (status, body) = post_raw(broker, "/handle", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "body must have only a single JSON value");
    assert_eq!(mail.hits(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let broker = broker(offline_config().await, None);
    let padding = "x".repeat(MAX_BODY_BYTES);
    let body = json!({ "action": "log", "log": { "name": "big", "data": padding } }).to_string();

    let (status, body) = post_raw(broker, "/handle", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_raw(broker, "/handle", "{\"action\": ").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn missing_payload_is_rejected() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_json(broker, "/handle", &json!({ "action": "mail" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing mail payload");
}

#[tokio::test]
async fn unknown_log_route_is_rejected() {
    let broker = broker(offline_config().await, None);
    let request = json!({ "action": "log", "log": { "name": "n", "data": "d" } });

    let (status, body) = post_json(broker, "/handle/pigeon", &request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "unknown log route: pigeon");
}

#[tokio::test]
async fn log_grpc_without_log_payload_is_rejected() {
    let (base, mail) = mock_service(202, json!({ "error": false, "message": "sent" })).await;
    let config = BrokerConfig {
        mail_url: format!("{base}/send"),
        ..offline_config().await
    };
    let broker = broker(config, None);
    let request = json!({
        "action": "mail",
        "mail": { "from": "me@example.com", "to": "you@example.com", "subject": "Hi", "message": "Hello" }
    });

    let (status, body) = post_json(broker, "/log-grpc", &request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": true, "message": "missing log payload" }));
    assert_eq!(mail.hits(), 0);
}
