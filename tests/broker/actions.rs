//! `auth` and `mail` over the HTTP adapter.

use axum::http::StatusCode;
use serde_json::json;
use sourced_broker::BrokerConfig;

use crate::support::{broker, mock_service, offline_config, post_json};

fn mail_request(to: &str) -> serde_json::Value {
    json!({
        "action": "mail",
        "mail": { "from": "me@example.com", "to": to, "subject": "Hello", "message": "Hi there" }
    })
}

fn auth_request() -> serde_json::Value {
    json!({
        "action": "auth",
        "auth": { "email": "admin@example.com", "password": "verysecret" }
    })
}

#[tokio::test]
async fn mail_is_sent_and_names_recipient() {
    let (base, mail) = mock_service(202, json!({ "error": false, "message": "sent" })).await;
    let config = BrokerConfig {
        mail_url: format!("{base}/send"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    for to in ["you@example.com", "ops+alerts@example.org"] {
        let (status, body) = post_json(broker.clone(), "/handle", &mail_request(to)).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["error"], false);
        assert!(body["message"].as_str().unwrap().contains(to));
    }

    assert_eq!(mail.hits(), 2);
    assert_eq!(mail.bodies()[0]["to"], "you@example.com");
    assert_eq!(mail.bodies()[0]["subject"], "Hello");
}

#[tokio::test]
async fn mail_service_error_is_generic_failure() {
    let (base, _mail) = mock_service(500, json!({ "error": true, "message": "smtp down" })).await;
    let config = BrokerConfig {
        mail_url: format!("{base}/send"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &mail_request("you@example.com")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": true, "message": "error calling mail service" }));
}

#[tokio::test]
async fn unreachable_mail_service_is_normalized() {
    let broker = broker(offline_config().await, None);

    let (status, body) = post_json(broker, "/handle", &mail_request("you@example.com")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn auth_success_passes_user_through() {
    let user = json!({ "id": 1, "email": "admin@example.com" });
    let (base, auth) = mock_service(
        202,
        json!({ "error": false, "message": "Logged in user admin@example.com", "data": user }),
    )
    .await;
    let config = BrokerConfig {
        auth_url: format!("{base}/authenticate"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &auth_request()).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Authenticated!");
    assert_eq!(body["data"], user);
    assert_eq!(auth.bodies()[0]["email"], "admin@example.com");
}

#[tokio::test]
async fn auth_unauthorized_means_invalid_credentials() {
    let (base, _auth) = mock_service(401, json!({ "error": true, "message": "invalid credentials" })).await;
    let config = BrokerConfig {
        auth_url: format!("{base}/authenticate"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &auth_request()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": true, "message": "invalid credentials" }));
}

#[tokio::test]
async fn auth_error_flag_means_invalid_credentials() {
    let (base, _auth) = mock_service(202, json!({ "error": true, "message": "nope" })).await;
    let config = BrokerConfig {
        auth_url: format!("{base}/authenticate"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &auth_request()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid credentials");
}

#[tokio::test]
async fn auth_other_status_is_generic_failure() {
    let (base, _auth) = mock_service(503, json!({ "error": true, "message": "db down" })).await;
    let config = BrokerConfig {
        auth_url: format!("{base}/authenticate"),
        ..offline_config().await
    };
    let broker = broker(config, None);

    let (status, body) = post_json(broker, "/handle", &auth_request()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "error calling auth service");
}
