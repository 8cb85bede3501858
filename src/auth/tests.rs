//! Tests for the auth module

use super::*;
use crate::error::Error;
use crate::secrets::{InMemorySecretStore, SecretStore};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

fn service_account(token_uri: String) -> AuthConfig {
    let key = ServiceAccountKey {
        client_email: "pipeline@my-project.iam.gserviceaccount.com".to_string(),
        private_key: TEST_KEY.to_string(),
        token_uri,
        project_id: Some("my-project".to_string()),
    };
    AuthConfig::service_account(&key, &[CLOUD_PLATFORM_SCOPE])
}

/// Decode the claims segment of a JWT without verifying it
fn jwt_claims(jwt: &str) -> Value {
    let payload = jwt.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let client = reqwest::Client::new();
    let req = client.get("https://example.com/api");

    let built = auth.apply(req).await.unwrap().build().unwrap();
    assert!(built.headers().get("Authorization").is_none());
    assert!(auth.access_token().await.is_err());
}

#[tokio::test]
async fn test_query_token() {
    let auth = Authenticator::new(AuthConfig::query_token("access_token", "EAAB"));

    let client = reqwest::Client::new();
    let req = client.get("https://graph.example.com/v15.0/me?fields=id");
    let built = auth.apply(req).await.unwrap().build().unwrap();

    assert_eq!(
        built.url().as_str(),
        "https://graph.example.com/v15.0/me?fields=id&access_token=EAAB"
    );
    assert_eq!(auth.access_token().await.unwrap(), "EAAB");
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "my-bearer-token".to_string(),
    });

    let client = reqwest::Client::new();
    let req = client.get("https://example.com/api");
    let built = auth.apply(req).await.unwrap().build().unwrap();

    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer my-bearer-token"
    );
}

#[tokio::test]
async fn test_service_account_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.google",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let token_uri = format!("{}/token", mock_server.uri());
    let auth = Authenticator::new(service_account(token_uri.clone()));

    let client = reqwest::Client::new();
    let built = auth
        .apply(client.get("https://cloudtasks.example.com/v2/x"))
        .await
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer ya29.google"
    );

    let requests = mock_server.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    let assertion = body
        .split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap();
    let claims = jwt_claims(assertion);

    assert_eq!(claims["iss"], "pipeline@my-project.iam.gserviceaccount.com");
    assert_eq!(claims["aud"], token_uri);
    assert_eq!(claims["scope"], CLOUD_PLATFORM_SCOPE);
    assert_eq!(
        claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
        3600
    );
}

#[tokio::test]
async fn test_service_account_token_caching() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(service_account(format!("{}/token", mock_server.uri())));

    for _ in 0..3 {
        assert_eq!(auth.access_token().await.unwrap(), "cached-token");
    }
}

#[tokio::test]
async fn test_clear_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(service_account(format!("{}/token", mock_server.uri())));

    auth.access_token().await.unwrap();
    auth.clear_cache().await;
    auth.access_token().await.unwrap();
}

#[tokio::test]
async fn test_token_exchange_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(service_account(format!("{}/token", mock_server.uri())));
    let err = auth.access_token().await.unwrap_err();

    match err {
        Error::OAuth2 { message } => {
            assert!(message.contains("400"));
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("Expected OAuth2 error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_private_key() {
    let mut config = service_account("https://oauth2.example.com/token".to_string());
    if let AuthConfig::ServiceAccount { private_key, .. } = &mut config {
        *private_key = "not a key".to_string();
    }

    let auth = Authenticator::new(config);
    let err = auth.access_token().await.unwrap_err();
    assert!(matches!(err, Error::JwtGeneration { .. }));
}

// ============================================================================
// OAuth authorization-code flow
// ============================================================================

fn oauth_config(graph_url: String) -> OAuthConfig {
    OAuthConfig {
        client_id: "1234".to_string(),
        redirect_uri: "https://pipeline.example.com/auth/callback".to_string(),
        dialog_base: "https://www.facebook.com".to_string(),
        graph_url,
        api_version: "v15.0".to_string(),
        scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
        client_secret_name: "FB_CLIENT_SECRET".to_string(),
        token_secret: "facebook-user-token".to_string(),
    }
}

#[test]
fn test_authorize_url() {
    let flow = OAuthFlow::new(
        oauth_config("https://graph.facebook.com/v15.0".to_string()),
        Arc::new(InMemorySecretStore::new()),
    )
    .unwrap();

    let url = url::Url::parse(&flow.authorize_url().unwrap()).unwrap();
    assert_eq!(url.host_str(), Some("www.facebook.com"));
    assert_eq!(url.path(), "/v15.0/dialog/oauth");

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("response_type".to_string(), "code".to_string()),
            ("client_id".to_string(), "1234".to_string()),
            (
                "redirect_uri".to_string(),
                "https://pipeline.example.com/auth/callback".to_string()
            ),
            (
                "scope".to_string(),
                "read_insights,ads_management,ads_read,business_management".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_exchange_code_persists_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .and(query_param("code", "abc"))
        .and(query_param("client_id", "1234"))
        .and(query_param("client_secret", "app-secret"))
        .and(query_param(
            "redirect_uri",
            "https://pipeline.example.com/auth/callback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "EAAB-new",
            "token_type": "bearer",
            "expires_in": 5183944
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let secrets = Arc::new(InMemorySecretStore::new().with("FB_CLIENT_SECRET", "app-secret"));
    let flow = OAuthFlow::new(oauth_config(mock_server.uri()), secrets.clone()).unwrap();

    let token = flow.exchange_code("abc").await.unwrap();
    assert_eq!(token.expires_in, Some(5_183_944));
    assert_eq!(
        secrets.get("facebook-user-token").await.unwrap(),
        "EAAB-new"
    );

    let serialized = serde_json::to_value(&token).unwrap();
    assert!(serialized.get("access_token").is_none());
}

#[tokio::test]
async fn test_exchange_code_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "This authorization code has expired.", "code": 100 }
        })))
        .mount(&mock_server)
        .await;

    let secrets = Arc::new(InMemorySecretStore::new().with("FB_CLIENT_SECRET", "app-secret"));
    let flow = OAuthFlow::new(oauth_config(mock_server.uri()), secrets.clone()).unwrap();

    let err = flow.exchange_code("stale").await.unwrap_err();
    assert!(matches!(err, Error::OAuth2 { .. }));
    assert!(err.to_string().contains("expired"));
    assert!(secrets.get("facebook-user-token").await.is_err());
}

#[tokio::test]
async fn test_exchange_requires_client_secret() {
    let flow = OAuthFlow::new(
        oauth_config("http://127.0.0.1:9".to_string()),
        Arc::new(InMemorySecretStore::new()),
    )
    .unwrap();

    let err = flow.exchange_code("abc").await.unwrap_err();
    assert!(matches!(err, Error::Secret { .. }));

    let err = flow.exchange_code("").await.unwrap_err();
    assert!(matches!(err, Error::OAuth2 { .. }));
}
