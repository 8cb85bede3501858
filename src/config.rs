//! Process configuration
//!
//! Settings come from an optional YAML file, then a handful of environment
//! variables override individual keys. Every key has a default, and the
//! default backends (in-memory queue, local sink, environment secrets) need
//! no cloud project, so an empty file (or none) is a valid local setup.

use crate::auth::{OAuthConfig, DEFAULT_SCOPES};
use crate::error::{Error, Result};
use crate::http::RateLimiterConfig;
use crate::provider::{GraphConfig, PollConfig, GRAPH_API_URL};
use crate::queue::CLOUD_TASKS_URL;
use crate::sink::{SinkWriterConfig, BIGQUERY_URL};
use crate::secrets::SECRET_MANAGER_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete process configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub polling: PollConfig,
    pub dispatch: DispatchSettings,
    pub queue: QueueSettings,
    pub sink: SinkSettings,
    pub secrets: SecretsSettings,
    pub oauth: OAuthSettings,
    pub server: ServerSettings,
    pub google: GoogleSettings,
}

impl Settings {
    /// Load from an optional YAML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("Failed to read {}: {e}", path.display()))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse YAML without environment overrides or validation
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PUBLIC_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(port) = get("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(project) = get("GOOGLE_CLOUD_PROJECT") {
            self.google.project = Some(project);
        }
        if let Some(path) = get("GOOGLE_APPLICATION_CREDENTIALS") {
            self.google.credentials = Some(PathBuf::from(path));
        }
        if let Some(client_id) = get("FB_CLIENT_ID") {
            self.oauth.client_id = Some(client_id);
        }
        if let Some(ids) = get("FB_BUSINESS_IDS") {
            self.dispatch.business_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(dir) = get("INSIGHTS_SINK_DIR") {
            self.sink.local_dir = PathBuf::from(dir);
        }
    }

    /// Reject settings that cannot work together
    pub fn validate(&self) -> Result<()> {
        if self.provider.page_size == 0 {
            return Err(Error::config("provider.page_size must be positive"));
        }
        if self.polling.max_attempts == 0 {
            return Err(Error::config("polling.max_attempts must be positive"));
        }
        if !(0..=MAX_DEFAULT_DAYS).contains(&self.dispatch.default_days) {
            return Err(Error::config(format!(
                "dispatch.default_days must be between 0 and {MAX_DEFAULT_DAYS}"
            )));
        }

        if self.queue.backend == QueueBackend::CloudTasks {
            self.queue_project()?;
            if self.queue.service_account_email.is_none() {
                return Err(Error::config(
                    "queue.service_account_email is required for Cloud Tasks",
                ));
            }
            self.callback_url()?;
        }

        if self.sink.backend == SinkBackend::BigQuery {
            self.sink_project()?;
            if self.sink.staging_url.is_none() {
                return Err(Error::config("sink.staging_url is required for BigQuery"));
            }
        }

        if self.secrets.backend == SecretsBackend::Gcp {
            self.secrets_project()?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------------

    fn project_for(&self, explicit: Option<&String>, section: &str) -> Result<String> {
        explicit
            .or(self.google.project.as_ref())
            .cloned()
            .ok_or_else(|| {
                Error::config(format!(
                    "{section}.project or GOOGLE_CLOUD_PROJECT must be set"
                ))
            })
    }

    pub fn queue_project(&self) -> Result<String> {
        self.project_for(self.queue.project.as_ref(), "queue")
    }

    pub fn sink_project(&self) -> Result<String> {
        self.project_for(self.sink.project.as_ref(), "sink")
    }

    pub fn secrets_project(&self) -> Result<String> {
        self.project_for(self.secrets.project.as_ref(), "secrets")
    }

    /// URL queued tasks are delivered to
    pub fn callback_url(&self) -> Result<String> {
        if let Some(url) = &self.dispatch.callback_url {
            return Ok(url.clone());
        }
        self.server
            .public_url
            .as_ref()
            .map(|base| format!("{}/", base.trim_end_matches('/')))
            .ok_or_else(|| Error::config("dispatch.callback_url or PUBLIC_URL must be set"))
    }

    /// Absolute OAuth callback URL
    pub fn redirect_uri(&self) -> Result<String> {
        let base = self
            .server
            .public_url
            .as_ref()
            .ok_or_else(|| Error::config("PUBLIC_URL must be set for the OAuth flow"))?;
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            self.oauth.redirect_path.trim_start_matches('/')
        ))
    }

    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            base_url: self.provider.base_url.clone(),
            api_version: self.provider.api_version.clone(),
            account_prefix: self.provider.account_prefix.clone(),
            page_size: self.provider.page_size,
            timeout: Duration::from_secs(self.provider.timeout_secs),
            rate_limit: self.provider.rate_limit.clone(),
        }
    }

    pub fn oauth_config(&self) -> Result<OAuthConfig> {
        let client_id = self
            .oauth
            .client_id
            .clone()
            .ok_or_else(|| Error::config("oauth.client_id or FB_CLIENT_ID must be set"))?;

        Ok(OAuthConfig {
            client_id,
            redirect_uri: self.redirect_uri()?,
            dialog_base: self.oauth.dialog_base.clone(),
            graph_url: self.graph_config().versioned_url(),
            api_version: self.provider.api_version.clone(),
            scopes: self.oauth.scopes.clone(),
            client_secret_name: self.oauth.client_secret_name.clone(),
            token_secret: self.oauth.token_secret.clone(),
        })
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Report provider connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_version: String,
    pub account_prefix: String,
    pub page_size: u32,
    pub timeout_secs: u64,
    /// Secret holding the user access token
    pub token_secret: String,
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: GRAPH_API_URL.to_string(),
            api_version: "v15.0".to_string(),
            account_prefix: "act_".to_string(),
            page_size: 500,
            timeout_secs: 60,
            token_secret: "facebook-user-token".to_string(),
            rate_limit: Some(RateLimiterConfig::default()),
        }
    }
}

/// Longest trailing window a dispatch may default to, in days
pub const MAX_DEFAULT_DAYS: i64 = 3650;

/// Fan-out dispatch
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Businesses whose ad accounts are discovered
    pub business_ids: Vec<String>,
    pub deduplicate: bool,
    /// Defaults to `PUBLIC_URL` + `/`
    pub callback_url: Option<String>,
    /// Trailing window used when a dispatch request names no dates
    pub default_days: i64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            business_ids: Vec::new(),
            deduplicate: true,
            callback_url: None,
            default_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    CloudTasks,
    /// Tasks stay in process; useful for dry runs
    #[default]
    Memory,
}

/// Task queue
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub backend: QueueBackend,
    pub project: Option<String>,
    pub location: String,
    pub queue: String,
    pub base_url: String,
    /// Identity of the OIDC token attached to each task
    pub service_account_email: Option<String>,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            backend: QueueBackend::default(),
            project: None,
            location: "us-central1".to_string(),
            queue: "fb-ads-insights".to_string(),
            base_url: CLOUD_TASKS_URL.to_string(),
            service_account_email: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
    #[default]
    Local,
    #[serde(rename = "bigquery")]
    BigQuery,
}

/// Warehouse
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub backend: SinkBackend,
    /// Directory for the local backend
    pub local_dir: PathBuf,
    pub project: Option<String>,
    pub dataset: String,
    pub location: Option<String>,
    pub base_url: String,
    /// `gs://bucket/prefix` or a local directory
    pub staging_url: Option<String>,
    #[serde(flatten)]
    pub writer: SinkWriterConfig,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            backend: SinkBackend::default(),
            local_dir: PathBuf::from("insights-data"),
            project: None,
            dataset: "insights".to_string(),
            location: None,
            base_url: BIGQUERY_URL.to_string(),
            staging_url: None,
            writer: SinkWriterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretsBackend {
    Gcp,
    #[default]
    Env,
}

/// Secret store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    pub backend: SecretsBackend,
    pub project: Option<String>,
    pub base_url: String,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            backend: SecretsBackend::default(),
            project: None,
            base_url: SECRET_MANAGER_URL.to_string(),
        }
    }
}

/// Provider OAuth flow
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: Option<String>,
    pub client_secret_name: String,
    /// Secret the exchanged token is written to
    pub token_secret: String,
    pub redirect_path: String,
    pub dialog_base: String,
    pub scopes: Vec<String>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret_name: "FB_CLIENT_SECRET".to_string(),
            token_secret: "facebook-user-token".to_string(),
            redirect_path: "/auth/callback".to_string(),
            dialog_base: "https://www.facebook.com".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// HTTP trigger
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Externally reachable base URL of this service
    pub public_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: None,
        }
    }
}

/// Google Cloud identity shared by the queue, sink and secret store
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub project: Option<String>,
    /// Service account key file
    pub credentials: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider.page_size, 500);
        assert_eq!(settings.provider.api_version, "v15.0");
        assert_eq!(settings.polling.interval_secs, 10);
        assert_eq!(settings.queue.location, "us-central1");
        assert_eq!(settings.queue.queue, "fb-ads-insights");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.dispatch.default_days, 7);
        assert!(settings.dispatch.deduplicate);
        assert_eq!(settings.provider.token_secret, settings.oauth.token_secret);
    }

    #[test]
    fn test_yaml_sections() {
        let yaml = r#"
provider:
  api_version: v16.0
polling:
  interval_secs: 5
  max_attempts: 20
dispatch:
  business_ids: ["111", "222"]
sink:
  backend: bigquery
  project: analytics
  dataset: fb
  staging_url: gs://staging/insights
  flush_bytes: 1024
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.provider.api_version, "v16.0");
        assert_eq!(settings.provider.page_size, 500);
        assert_eq!(settings.polling.max_attempts, 20);
        assert_eq!(settings.dispatch.business_ids, vec!["111", "222"]);
        assert_eq!(settings.sink.backend, SinkBackend::BigQuery);
        assert_eq!(settings.sink.writer.flush_bytes, 1024);
        assert_eq!(settings.graph_config().versioned_url(), "https://graph.facebook.com/v16.0");
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(Settings::from_yaml("connectors: {}").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_overrides(env(&[
            ("PUBLIC_URL", "https://pipeline.example.com/"),
            ("PORT", "9090"),
            ("GOOGLE_CLOUD_PROJECT", "proj"),
            ("FB_CLIENT_ID", "1234"),
            ("FB_BUSINESS_IDS", "111, 222,"),
            ("INSIGHTS_SINK_DIR", "/data"),
        ]));

        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.queue_project().unwrap(), "proj");
        assert_eq!(settings.dispatch.business_ids, vec!["111", "222"]);
        assert_eq!(settings.sink.local_dir, PathBuf::from("/data"));
        assert_eq!(
            settings.callback_url().unwrap(),
            "https://pipeline.example.com/"
        );
        assert_eq!(
            settings.redirect_uri().unwrap(),
            "https://pipeline.example.com/auth/callback"
        );

        let oauth = settings.oauth_config().unwrap();
        assert_eq!(oauth.client_id, "1234");
        assert_eq!(oauth.graph_url, "https://graph.facebook.com/v15.0");
    }

    #[test]
    fn test_cloud_tasks_requires_identity() {
        let mut settings = Settings::default();
        settings.queue.backend = QueueBackend::CloudTasks;
        settings.apply_overrides(env(&[
            ("GOOGLE_CLOUD_PROJECT", "proj"),
            ("PUBLIC_URL", "https://pipeline.example.com"),
        ]));
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("service_account_email"));

        settings.queue.service_account_email = Some("runner@proj.iam.gserviceaccount.com".into());
        settings.validate().unwrap();
    }

    #[test]
    fn test_local_defaults_validate() {
        let settings = Settings::default();
        assert_eq!(settings.queue.backend, QueueBackend::Memory);
        assert_eq!(settings.sink.backend, SinkBackend::Local);
        settings.validate().unwrap();
    }

    #[test]
    fn test_bigquery_requires_staging() {
        let mut settings = Settings::default();
        settings.sink.backend = SinkBackend::BigQuery;
        settings.google.project = Some("proj".into());

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("staging_url"));
    }

    #[test]
    fn test_secrets_default_to_secret_manager() {
        let settings = Settings::default();
        assert_eq!(settings.secrets.base_url, SECRET_MANAGER_URL);
        assert_eq!(
            settings.secrets.base_url,
            "https://secretmanager.googleapis.com/v1"
        );
    }

    #[test]
    fn test_default_days_bounds() {
        let mut settings = Settings::default();
        settings.dispatch.default_days = MAX_DEFAULT_DAYS;
        settings.validate().unwrap();

        settings.dispatch.default_days = MAX_DEFAULT_DAYS + 1;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("default_days"));

        settings.dispatch.default_days = -1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut settings = Settings::default();
        settings.provider.page_size = 0;
        assert!(settings.validate().is_err());
    }
}
