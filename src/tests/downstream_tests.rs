//! Downstream client error mapping against a mock HTTP server.

use crate::downstream::{DownstreamClient, DownstreamConfig};
use crate::errors::{PermanentError, ProxyError, TransientError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> DownstreamClient {
    DownstreamClient::new(
        DownstreamConfig::new(&server.uri())
            .expect("mock server URI is valid")
            .timeout(Duration::from_millis(500)),
    )
    .expect("client builds")
}

#[tokio::test]
async fn test_post_round_trips_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "processed": true })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client
        .post("process", &json!({ "data": "payload" }))
        .await
        .unwrap();

    assert_eq!(response, json!({ "processed": true }));
}

#[tokio::test]
async fn test_server_error_maps_to_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let error = client
        .post("process", &json!({}))
        .await
        .expect_err("500 must fail");

    assert!(matches!(
        error,
        ProxyError::Transient(TransientError::ServiceUnavailable { status: 500, .. })
    ));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_too_many_requests_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let error = client
        .post("process", &json!({}))
        .await
        .expect_err("429 must fail");

    assert!(error.is_retryable());
    assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_client_error_maps_to_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let error = client
        .post("process", &json!({}))
        .await
        .expect_err("422 must fail");

    match error {
        ProxyError::Permanent(PermanentError::Rejected { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "unprocessable");
        }
        other => panic!("expected permanent rejection, got {other}"),
    }
}

#[tokio::test]
async fn test_slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let error = client
        .post("process", &json!({}))
        .await
        .expect_err("slow response must time out");

    assert!(matches!(
        error,
        ProxyError::Transient(TransientError::Timeout)
    ));
    assert_eq!(error.http_status(), Some(504));
}

#[tokio::test]
async fn test_malformed_body_maps_to_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let error = client
        .post("process", &json!({}))
        .await
        .expect_err("malformed body must fail");

    assert!(matches!(
        error,
        ProxyError::Permanent(PermanentError::UnexpectedResponse { .. })
    ));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_get_round_trips_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let response = client.get("status").await.unwrap();

    assert_eq!(response, json!({ "status": "healthy" }));
}
