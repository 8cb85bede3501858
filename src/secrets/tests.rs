//! Tests for the secrets module

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gcp_store(server: &MockServer) -> GcpSecretManager {
    GcpSecretManager::with_endpoint(
        "my-project",
        server.uri(),
        AuthConfig::Bearer {
            token: "google-token".to_string(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_gcp_get_decodes_latest_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/projects/my-project/secrets/facebook-user-token/versions/latest:access",
        ))
        .and(header("Authorization", "Bearer google-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/1/secrets/facebook-user-token/versions/3",
            "payload": { "data": "RUFBQnRva2Vu" }
        })))
        .mount(&mock_server)
        .await;

    let store = gcp_store(&mock_server);
    let value = store.get("facebook-user-token").await.unwrap();
    assert_eq!(value, "EAABtoken");
}

#[tokio::test]
async fn test_gcp_set_adds_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/projects/my-project/secrets/facebook-user-token:addVersion"))
        .and(body_json(json!({ "payload": { "data": "RUFBQnRva2Vu" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = gcp_store(&mock_server);
    store.set("facebook-user-token", "EAABtoken").await.unwrap();
}

#[tokio::test]
async fn test_gcp_missing_secret_names_it() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Secret not found" }
        })))
        .mount(&mock_server)
        .await;

    let store = gcp_store(&mock_server);
    let err = store.get("FB_CLIENT_SECRET").await.unwrap_err();

    match err {
        Error::Secret { name, message } => {
            assert_eq!(name, "FB_CLIENT_SECRET");
            assert!(message.contains("Secret not found"));
        }
        other => panic!("Expected Secret error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_in_memory_store() {
    let store = InMemorySecretStore::new().with("a", "1");
    assert_eq!(store.get("a").await.unwrap(), "1");
    assert!(store.get("b").await.is_err());

    store.set("a", "2").await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), "2");
}

#[test]
fn test_env_var_name() {
    assert_eq!(
        EnvSecretStore::var_name("facebook-user-token"),
        "FACEBOOK_USER_TOKEN"
    );
    assert_eq!(EnvSecretStore::var_name("FB_CLIENT_SECRET"), "FB_CLIENT_SECRET");
}

#[tokio::test]
async fn test_env_store_overrides_shadow_environment() {
    let store = EnvSecretStore::new();
    assert!(store
        .get("insights-pipeline-test-unset-secret")
        .await
        .is_err());

    store
        .set("insights-pipeline-test-unset-secret", "value")
        .await
        .unwrap();
    assert_eq!(
        store.get("insights-pipeline-test-unset-secret").await.unwrap(),
        "value"
    );
}
