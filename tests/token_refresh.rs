//! Integration tests for OAuth token refresh.
//!
//! The refresh endpoint is a local `wiremock` server; `.expect(n)` on each
//! mock verifies the number of refresh calls when the server is dropped.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use luna_sdk::auth::{BoxError, TokenAuth, TokenPair};
use luna_sdk::error::ErrorKind;
use luna_sdk::prelude::*;

const REFRESH_PATH: &str = "/v1/auth/refresh";

fn expired_pair() -> TokenPair {
    TokenPair::new("old-access")
        .with_refresh_token("old-refresh")
        .with_expires_at(Utc::now() - chrono::Duration::minutes(1))
}

fn refresh_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), REFRESH_PATH)
}

async fn mount_refresh_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refresh_token": "old-refresh"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "access_token": "new-access",
                    "refresh_token": "new-refresh",
                    "expires_in": 3600
                }))
                // Keeps the refresh in flight while every caller joins it.
                .set_delay(Duration::from_millis(200)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let server = MockServer::start().await;
    mount_refresh_ok(&server, 1).await;

    let auth = TokenAuth::new(expired_pair(), refresh_url(&server)).unwrap();
    assert!(auth.needs_refresh().await);

    let results = join_all((0..10).map(|_| {
        let auth = auth.clone();
        async move { auth.headers().await }
    }))
    .await;

    for headers in results {
        assert_eq!(headers.unwrap()["authorization"], "Bearer new-access");
    }

    let tokens = auth.tokens().await;
    assert_eq!(tokens.access_token, "new-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("new-refresh"));
    assert!(tokens.expires_at.unwrap() > Utc::now() + chrono::Duration::minutes(59));
    assert!(!auth.needs_refresh().await);

    // A settled refresh does not linger; fresh tokens are served as-is.
    auth.headers().await.unwrap();
}

#[tokio::test]
async fn test_failed_refresh_is_shared() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("x-request-id", "req_refresh1")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = TokenAuth::new(expired_pair(), refresh_url(&server)).unwrap();
    let results = join_all((0..5).map(|_| {
        let auth = auth.clone();
        async move { auth.headers().await }
    }))
    .await;

    let errors: Vec<_> = results.into_iter().map(|r| r.unwrap_err()).collect();
    for err in &errors {
        assert_eq!(err, &errors[0]);
    }
    assert_eq!(errors[0].kind, ErrorKind::Authentication);
    assert_eq!(errors[0].message, "refresh failed: 401");
    assert_eq!(errors[0].request_id.as_deref(), Some("req_refresh1"));
    assert!(!errors[0].is_retryable());

    // The pair is untouched.
    assert_eq!(auth.tokens().await.access_token, "old-access");
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_omitted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2"})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = TokenAuth::new(expired_pair(), refresh_url(&server)).unwrap();
    auth.refresh().await.unwrap();

    let tokens = auth.tokens().await;
    assert_eq!(tokens.access_token, "a2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
    assert!(tokens.expires_at.is_none());
}

#[tokio::test]
async fn test_refresh_callback_receives_new_pair() {
    let server = MockServer::start().await;
    mount_refresh_ok(&server, 1).await;

    let seen: Arc<Mutex<Vec<TokenPair>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let auth = TokenAuth::builder(expired_pair(), refresh_url(&server))
        .on_refresh(Arc::new(move |pair: TokenPair| -> Result<(), BoxError> {
            sink.lock().unwrap().push(pair);
            Ok(())
        }))
        .build()
        .unwrap();

    auth.headers().await.unwrap();

    // The callback runs detached; give it a moment.
    for _ in 0..50 {
        if !seen.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].access_token, "new-access");
}

#[tokio::test]
async fn test_callback_error_does_not_fail_refresh() {
    let server = MockServer::start().await;
    mount_refresh_ok(&server, 1).await;

    let auth = TokenAuth::builder(expired_pair(), refresh_url(&server))
        .on_refresh(Arc::new(|_pair: TokenPair| -> Result<(), BoxError> {
            Err("disk full".into())
        }))
        .build()
        .unwrap();

    let headers = auth.headers().await.unwrap();
    assert_eq!(headers["authorization"], "Bearer new-access");
}

#[tokio::test]
async fn test_transport_refreshes_before_sending() {
    let server = MockServer::start().await;
    mount_refresh_ok(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/prj_1"))
        .and(header("authorization", "Bearer new-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "prj_1",
            "name": "Harbour",
            "owner_id": "usr_1",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = LunaClient::builder()
        .base_url(&server.uri())
        .tokens("old-access", Some("old-refresh"))
        .expires_at(Utc::now() - chrono::Duration::minutes(1))
        .build()
        .unwrap();

    let project = client.projects().get("prj_1").await.unwrap();
    assert_eq!(project.name, "Harbour");
}

#[tokio::test]
async fn test_transport_surfaces_refresh_failure_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = LunaClient::builder()
        .base_url(&server.uri())
        .tokens("old-access", Some("old-refresh"))
        .expires_at(Utc::now() - chrono::Duration::minutes(1))
        .build()
        .unwrap();

    let err = client
        .request(RequestConfig::get("/v1/ping"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
}

#[tokio::test]
async fn test_hung_refresh_endpoint_respects_client_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = LunaClient::builder()
        .base_url(&server.uri())
        .tokens("old-access", Some("old-refresh"))
        .expires_at(Utc::now() - chrono::Duration::minutes(1))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = client
        .request(RequestConfig::get("/v1/ping"))
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(err.message, "token refresh failed: Request timeout");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_refresh_timeout_on_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let auth = TokenAuth::builder(expired_pair(), refresh_url(&server))
        .refresh_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = auth.refresh().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(auth.tokens().await.access_token, "old-access");
}
