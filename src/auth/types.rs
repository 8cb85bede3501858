//! Auth configuration types

use crate::error::{Error, Result};
use crate::types::JwtAlgorithm;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Google OAuth2 scope covering Secret Manager, Cloud Tasks and BigQuery
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Authentication applied to every request of an `HttpClient`
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// Token sent as a query parameter (the Graph API `access_token`)
    QueryToken {
        /// Query parameter name
        param: String,
        /// The token value
        token: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Google service account: a signed JWT assertion exchanged for an access token
    ServiceAccount {
        /// Service account email (iss claim)
        client_email: String,
        /// Private key for signing (PEM format)
        private_key: String,
        /// Token endpoint, also the aud claim
        token_uri: String,
        /// Requested scopes
        scopes: Vec<String>,
        /// Signing algorithm
        algorithm: JwtAlgorithm,
        /// Assertion lifetime in seconds
        token_lifetime_seconds: u64,
    },
}

impl AuthConfig {
    /// Create a query parameter token config
    pub fn query_token(param: impl Into<String>, token: impl Into<String>) -> Self {
        Self::QueryToken {
            param: param.into(),
            token: token.into(),
        }
    }

    /// Create a service account config from a downloaded key
    pub fn service_account(key: &ServiceAccountKey, scopes: &[&str]) -> Self {
        Self::ServiceAccount {
            client_email: key.client_email.clone(),
            private_key: key.private_key.clone(),
            token_uri: key.token_uri.clone(),
            scopes: scopes.iter().map(|s| (*s).to_string()).collect(),
            algorithm: JwtAlgorithm::RS256,
            token_lifetime_seconds: 3600,
        }
    }
}

/// The subset of a Google service account JSON key the pipeline needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Load a key file (the `GOOGLE_APPLICATION_CREDENTIALS` format)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::auth(format!(
                "Failed to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::auth(format!("Invalid service account key: {e}")))
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 60 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(60) >= expires_at,
            None => false,
        }
    }
}
