// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry-after-refresh behavior of the authenticated transport.

use diagram_sync::error::SyncError;
use diagram_sync::time_utils::now_ms;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod common;
use common::{request_log, seed_credentials, test_env};

const ELEMENTS_PATH: &str = "/diagrams/d1/elements";

fn elements_body() -> serde_json::Value {
    json!({"elements": [{"id": "e1"}], "permission": "edit"})
}

async fn mount_refresh(server: &wiremock::MockServer, status: u16, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "token": "new-token",
            "refreshToken": "refresh-token-2",
            "exp": now_ms() / 1000 + 3600,
        })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_401_refreshes_and_retries_once() {
    let env = test_env().await;
    seed_credentials(&env.store, "old-token", 3_600_000, 86_400_000);

    Mock::given(method("GET"))
        .and(path(ELEMENTS_PATH))
        .and(header("authorization", "Bearer old-token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path(ELEMENTS_PATH))
        .and(header("authorization", "Bearer new-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(elements_body()))
        .expect(1)
        .mount(&env.server)
        .await;
    mount_refresh(&env.server, 200, 1).await;

    let payload = env.client.api.get_elements("d1").await.unwrap().unwrap();
    assert_eq!(payload.elements.unwrap().len(), 1);

    let log = request_log(&env.server).await;
    assert_eq!(
        log,
        vec![
            format!("GET {ELEMENTS_PATH}"),
            "POST /auth/refresh".to_string(),
            format!("GET {ELEMENTS_PATH}"),
        ]
    );
}

#[tokio::test]
async fn test_failed_refresh_returns_original_401() {
    let env = test_env().await;
    seed_credentials(&env.store, "old-token", 3_600_000, 86_400_000);

    Mock::given(method("GET"))
        .and(path(ELEMENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;
    mount_refresh(&env.server, 500, 1).await;

    let result = env.client.api.get_elements("d1").await;
    assert!(matches!(result, Err(SyncError::Unauthorized)));
    assert!(!env.client.auth.auth_state().is_authenticated);
}

#[tokio::test]
async fn test_second_401_is_not_retried_again() {
    let env = test_env().await;
    seed_credentials(&env.store, "old-token", 3_600_000, 86_400_000);

    Mock::given(method("GET"))
        .and(path(ELEMENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&env.server)
        .await;
    mount_refresh(&env.server, 200, 1).await;

    let result = env.client.api.get_elements("d1").await;
    assert!(matches!(result, Err(SyncError::Unauthorized)));
}

#[tokio::test]
async fn test_anonymous_request_is_not_retried() {
    let env = test_env().await;

    Mock::given(method("GET"))
        .and(path(ELEMENTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&env.server)
        .await;
    mount_refresh(&env.server, 200, 0).await;

    let result = env.client.api.get_elements("d1").await;
    assert!(matches!(result, Err(SyncError::Unauthorized)));

    let requests = env.server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_missing_document_is_none_and_delete_is_idempotent() {
    let env = test_env().await;
    seed_credentials(&env.store, "old-token", 3_600_000, 86_400_000);

    Mock::given(method("GET"))
        .and(path("/diagrams/gone/elements"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/diagrams/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&env.server)
        .await;

    assert!(env.client.api.get_elements("gone").await.unwrap().is_none());
    env.client.api.delete("gone").await.unwrap();
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let env = test_env().await;
    seed_credentials(&env.store, "old-token", 3_600_000, 86_400_000);

    Mock::given(method("PUT"))
        .and(path(ELEMENTS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .api
        .save_elements("d1", &[json!({"id": "e1"})], None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_transport_failure());
}
