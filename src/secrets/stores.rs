//! Secret store backends

use super::SecretStore;
use crate::auth::{AuthConfig, ServiceAccountKey, CLOUD_PLATFORM_SCOPE};
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Default Secret Manager endpoint
pub const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com/v1";

// ============================================================================
// Google Secret Manager
// ============================================================================

/// Google Secret Manager over its REST API
pub struct GcpSecretManager {
    http: HttpClient,
    project: String,
}

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

impl GcpSecretManager {
    /// Create a store authenticated with a service account key
    pub fn new(project: impl Into<String>, key: &ServiceAccountKey) -> Result<Self> {
        Self::with_endpoint(
            project,
            SECRET_MANAGER_URL,
            AuthConfig::service_account(key, &[CLOUD_PLATFORM_SCOPE]),
        )
    }

    /// Create a store against an explicit endpoint
    pub fn with_endpoint(
        project: impl Into<String>,
        base_url: impl Into<String>,
        auth: AuthConfig,
    ) -> Result<Self> {
        let config = HttpClientConfig::builder()
            .base_url(base_url)
            .no_rate_limit()
            .build();
        Ok(Self {
            http: HttpClient::with_auth(config, auth)?,
            project: project.into(),
        })
    }

    fn secret_path(&self, name: &str) -> String {
        format!("projects/{}/secrets/{name}", self.project)
    }
}

#[async_trait]
impl SecretStore for GcpSecretManager {
    async fn get(&self, name: &str) -> Result<String> {
        let path = format!("{}/versions/latest:access", self.secret_path(name));
        let response: AccessSecretVersionResponse = self
            .http
            .get_json(&path, RequestConfig::new())
            .await
            .map_err(|e| Error::secret(name, e.to_string()))?;

        let bytes = STANDARD
            .decode(response.payload.data.as_bytes())
            .map_err(|e| Error::secret(name, format!("payload is not base64: {e}")))?;
        let value = String::from_utf8(bytes)
            .map_err(|e| Error::secret(name, format!("payload is not UTF-8: {e}")))?;

        debug!(secret = name, "Read secret");
        Ok(value)
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        let path = format!("{}:addVersion", self.secret_path(name));
        let body = json!({ "payload": { "data": STANDARD.encode(value.as_bytes()) } });

        self.http
            .post_with_config(&path, RequestConfig::new().json(body))
            .await
            .map_err(|e| Error::secret(name, e.to_string()))?;

        info!(secret = name, "Added secret version");
        Ok(())
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Secrets read from environment variables
///
/// `facebook-user-token` is looked up as `FACEBOOK_USER_TOKEN`. Writes stay in
/// process and shadow the environment.
#[derive(Default)]
pub struct EnvSecretStore {
    overrides: RwLock<HashMap<String, String>>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment variable holding a secret
    pub fn var_name(name: &str) -> String {
        name.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str) -> Result<String> {
        if let Some(value) = self
            .overrides
            .read()
            .map_err(|_| Error::secret(name, "lock poisoned"))?
            .get(name)
        {
            return Ok(value.clone());
        }

        let var = Self::var_name(name);
        std::env::var(&var).map_err(|_| Error::secret(name, format!("{var} is not set")))
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.overrides
            .write()
            .map_err(|_| Error::secret(name, "lock poisoned"))?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// In Memory
// ============================================================================

/// Secrets held in memory, for tests and local runs
#[derive(Default)]
pub struct InMemorySecretStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret
    #[must_use]
    pub fn with(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut values) = self.values.write() {
            values.insert(name.into(), value.into());
        }
        self
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, name: &str) -> Result<String> {
        self.values
            .read()
            .map_err(|_| Error::secret(name, "lock poisoned"))?
            .get(name)
            .cloned()
            .ok_or_else(|| Error::secret(name, "not found"))
    }

    async fn set(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .map_err(|_| Error::secret(name, "lock poisoned"))?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}
