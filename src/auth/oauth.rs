//! Provider OAuth authorization-code flow
//!
//! A user visits the dialog URL, the provider redirects back with a `code`,
//! and the code is exchanged for a user access token which is then written to
//! the secret store for later runs.

use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::secrets::SecretStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Permissions requested from the user
pub const DEFAULT_SCOPES: &[&str] = &[
    "read_insights",
    "ads_management",
    "ads_read",
    "business_management",
];

/// Settings for the OAuth flow
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// App id registered with the provider
    pub client_id: String,
    /// Absolute URL of the callback route
    pub redirect_uri: String,
    /// Dialog host, e.g. `https://www.facebook.com`
    pub dialog_base: String,
    /// Graph API base including version
    pub graph_url: String,
    /// API version used in the dialog path
    pub api_version: String,
    pub scopes: Vec<String>,
    /// Secret holding the app secret
    pub client_secret_name: String,
    /// Secret the user token is written to
    pub token_secret: String,
}

/// Token returned by the code exchange
///
/// The token itself never leaves the process through serialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserToken {
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Authorization-code flow against the provider
pub struct OAuthFlow {
    config: OAuthConfig,
    http: HttpClient,
    secrets: Arc<dyn SecretStore>,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig, secrets: Arc<dyn SecretStore>) -> Result<Self> {
        let http = HttpClient::with_config(
            HttpClientConfig::builder()
                .base_url(config.graph_url.clone())
                .no_rate_limit()
                .build(),
        )?;
        Ok(Self {
            config,
            http,
            secrets,
        })
    }

    /// URL of the provider's consent dialog
    pub fn authorize_url(&self) -> Result<String> {
        let base = format!(
            "{}/{}/dialog/oauth",
            self.config.dialog_base.trim_end_matches('/'),
            self.config.api_version
        );
        let mut url = Url::parse(&base)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(","));
        Ok(url.into())
    }

    /// Exchange an authorization code and persist the resulting token
    pub async fn exchange_code(&self, code: &str) -> Result<UserToken> {
        if code.is_empty() {
            return Err(Error::OAuth2 {
                message: "Missing authorization code".to_string(),
            });
        }

        let client_secret = self.secrets.get(&self.config.client_secret_name).await?;

        let token: UserToken = self
            .http
            .get_json(
                "/oauth/access_token",
                RequestConfig::new()
                    .query("code", code)
                    .query("client_id", self.config.client_id.as_str())
                    .query("client_secret", client_secret)
                    .query("redirect_uri", self.config.redirect_uri.as_str()),
            )
            .await
            .map_err(|e| Error::OAuth2 {
                message: format!("Code exchange failed: {e}"),
            })?;

        self.secrets
            .set(&self.config.token_secret, &token.access_token)
            .await?;

        info!(
            secret = %self.config.token_secret,
            expires_in = ?token.expires_in,
            "Stored new provider access token"
        );
        Ok(token)
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }
}
