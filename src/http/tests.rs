//! Tests for the HTTP client module

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .no_rate_limit()
        .build();
    HttpClient::with_config(config).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_some());
    assert!(config.user_agent.starts_with("insights-pipeline/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .base_url("https://graph.example.com/v15.0")
        .timeout(Duration::from_secs(5))
        .build();

    assert_eq!(
        config.base_url,
        Some("https://graph.example.com/v15.0".to_string())
    );
    assert_eq!(config.timeout, Duration::from_secs(5));
}

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("limit", "500")
        .query_opt("after", None::<String>)
        .query_opt("fields", Some("spend"))
        .header("X-Request-Id", "abc123")
        .json(json!({"key": "value"}));

    assert_eq!(
        config.query,
        vec![
            ("limit".to_string(), "500".to_string()),
            ("fields".to_string(), "spend".to_string())
        ]
    );
    assert_eq!(
        config.headers.get("X-Request-Id"),
        Some(&"abc123".to_string())
    );
    assert!(config.body.is_some());
}

#[test]
fn test_build_url() {
    let config = HttpClientConfig::builder()
        .base_url("https://graph.example.com/v15.0/")
        .no_rate_limit()
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(
        client.build_url("/act_1/insights"),
        "https://graph.example.com/v15.0/act_1/insights"
    );
    assert_eq!(
        client.build_url("https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[tokio::test]
async fn test_get_json_with_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/123/insights"))
        .and(query_param("limit", "500"))
        .and(query_param("after", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body: serde_json::Value = client
        .get_json(
            "/123/insights",
            RequestConfig::new().query("after", "abc").query("limit", "500"),
        )
        .await
        .unwrap();

    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_post_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/act_1/insights"))
        .and(body_json(json!({"level": "ad"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"report_run_id": "9"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body: serde_json::Value = client
        .post_json("/act_1/insights", RequestConfig::new().json(json!({"level": "ad"})))
        .await
        .unwrap();

    assert_eq!(body["report_run_id"], "9");
}

#[tokio::test]
async fn test_request_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("X-Request-Id", "req-456"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let response = client_for(&mock_server)
        .get_with_config("/secure", RequestConfig::new().header("X-Request-Id", "req-456"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_query_token_auth_applied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(query_param("access_token", "tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .no_rate_limit()
        .build();
    let client = HttpClient::with_auth(config, AuthConfig::query_token("access_token", "tok"))
        .unwrap();

    let body: serde_json::Value = client.get_json("/me", RequestConfig::new()).await.unwrap();
    assert_eq!(body["id"], "1");
}

#[tokio::test]
async fn test_graph_error_becomes_remote_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/act_1/insights"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "(#100) Invalid parameter",
                "type": "OAuthException",
                "code": 100,
                "fbtrace_id": "AbC"
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .post_with_config("/act_1/insights", RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::RemoteRequest { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "(#100) Invalid parameter");
        }
        other => panic!("Expected RemoteRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get_with_config("/flaky", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteRequest { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/garbage"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .get_json::<serde_json::Value>("/garbage", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
}

#[test]
fn test_remote_error_message() {
    assert_eq!(
        remote_error_message(r#"{"error": {"message": "bad token"}}"#),
        "bad token"
    );
    assert_eq!(
        remote_error_message(r#"{"error": "invalid_grant"}"#),
        "invalid_grant"
    );
    assert_eq!(remote_error_message("plain text"), "plain text");
}

#[tokio::test]
async fn test_http_client_with_rate_limiter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .rate_limit(RateLimiterConfig::new(100, 10))
        .build();

    let client = HttpClient::with_config(config).unwrap();
    assert!(client.has_rate_limiter());

    for _ in 0..3 {
        let response = client
            .get_with_config("/data", RequestConfig::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}

#[test]
fn test_http_client_debug() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let debug_str = format!("{client:?}");
    assert!(debug_str.contains("HttpClient"));
    assert!(debug_str.contains("has_rate_limiter"));
}
