//! Authenticator implementation
//!
//! Handles applying authentication to requests and managing token refresh.

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use crate::http::remote_error_message;
use crate::types::JwtAlgorithm;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// Cached access token for service account auth
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),

            AuthConfig::QueryToken { param, token } => Ok(req.query(&[(param, token)])),

            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),

            AuthConfig::ServiceAccount { .. } => {
                let token = self.access_token().await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    /// Get a valid access token, refreshing if necessary
    ///
    /// Static configs hand back their token as-is.
    pub async fn access_token(&self) -> Result<String> {
        match &self.config {
            AuthConfig::None => Err(Error::auth("No credentials configured")),
            AuthConfig::QueryToken { token, .. } | AuthConfig::Bearer { token } => {
                Ok(token.clone())
            }
            AuthConfig::ServiceAccount { .. } => self.get_or_refresh_token().await,
        }
    }

    async fn get_or_refresh_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the write lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.fetch_new_token().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    async fn fetch_new_token(&self) -> Result<CachedToken> {
        match &self.config {
            AuthConfig::ServiceAccount {
                client_email,
                private_key,
                token_uri,
                scopes,
                algorithm,
                token_lifetime_seconds,
            } => {
                let assertion = sign_assertion(
                    client_email,
                    private_key,
                    token_uri,
                    scopes,
                    *algorithm,
                    *token_lifetime_seconds,
                )?;
                self.exchange_assertion(token_uri, &assertion).await
            }
            _ => Err(Error::auth(
                "Token refresh not supported for this auth type",
            )),
        }
    }

    /// Exchange a signed assertion for a Google access token
    async fn exchange_assertion(&self, token_uri: &str, assertion: &str) -> Result<CachedToken> {
        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion),
        ];

        let response = self
            .http_client
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth2 {
                message: format!(
                    "Token exchange failed with status {status}: {}",
                    remote_error_message(&body)
                ),
            });
        }

        let token_response: TokenResponse = response.json().await.map_err(Error::Http)?;
        debug!(expires_in = ?token_response.expires_in, "Obtained service account token");
        Ok(token_response.into_cached_token())
    }

    /// Clear the cached token, forcing a refresh on the next request
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// Build and sign the service account assertion
pub(crate) fn sign_assertion(
    client_email: &str,
    private_key: &str,
    token_uri: &str,
    scopes: &[String],
    algorithm: JwtAlgorithm,
    lifetime_seconds: u64,
) -> Result<String> {
    let now = Utc::now().timestamp();
    #[allow(clippy::cast_possible_wrap)]
    let exp = now + lifetime_seconds as i64;

    let claims = JwtClaims {
        iss: client_email.to_string(),
        scope: scopes.join(" "),
        aud: token_uri.to_string(),
        iat: now,
        exp,
    };

    let header = Header::new(algorithm.into());

    let encoding_key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
        Error::JwtGeneration {
            message: format!("Invalid private key: {e}"),
        }
    })?;

    encode(&header, &claims, &encoding_key).map_err(|e| Error::JwtGeneration {
        message: format!("Failed to encode JWT: {e}"),
    })
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(self.access_token, secs),
            None => CachedToken::new(self.access_token, None),
        }
    }
}

/// Google service account assertion claims
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JwtClaims {
    pub(crate) iss: String,
    pub(crate) scope: String,
    pub(crate) aud: String,
    pub(crate) iat: i64,
    pub(crate) exp: i64,
}
