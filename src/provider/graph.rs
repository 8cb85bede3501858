//! Graph API client

use super::accounts::AccountEdge;
use super::types::{ReportRequest, ReportStatus};
use super::InsightsApi;
use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use crate::pagination::{CursorPaginator, Page};
use crate::secrets::SecretStore;
use crate::types::{Account, Cursor, JobId};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default Graph API host
pub const GRAPH_API_URL: &str = "https://graph.facebook.com";

/// Connection settings for [`GraphApi`]
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Host, without the version
    pub base_url: String,
    pub api_version: String,
    /// Prefix turning an account id into a node id
    pub account_prefix: String,
    /// Rows per result page
    pub page_size: u32,
    pub timeout: Duration,
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: GRAPH_API_URL.to_string(),
            api_version: "v15.0".to_string(),
            account_prefix: "act_".to_string(),
            page_size: 500,
            timeout: Duration::from_secs(60),
            rate_limit: Some(RateLimiterConfig::default()),
        }
    }
}

impl GraphConfig {
    /// Base URL including the API version
    pub fn versioned_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version
        )
    }
}

/// [`InsightsApi`] backed by the Graph API
///
/// The access token is sent as the `access_token` query parameter on every
/// call.
pub struct GraphApi {
    http: HttpClient,
    config: GraphConfig,
    paginator: CursorPaginator,
}

impl GraphApi {
    /// Create a client with a known access token
    pub fn new(config: GraphConfig, access_token: impl Into<String>) -> Result<Self> {
        let mut builder = HttpClientConfig::builder()
            .base_url(config.versioned_url())
            .timeout(config.timeout);
        builder = match &config.rate_limit {
            Some(limit) => builder.rate_limit(limit.clone()),
            None => builder.no_rate_limit(),
        };

        let http = HttpClient::with_auth(
            builder.build(),
            AuthConfig::query_token("access_token", access_token),
        )?;

        Ok(Self {
            http,
            config,
            paginator: CursorPaginator::graph(),
        })
    }

    /// Create a client with the token currently held in the secret store
    pub async fn connect(
        config: GraphConfig,
        secrets: &dyn SecretStore,
        token_secret: &str,
    ) -> Result<Self> {
        let token = secrets.get(token_secret).await?;
        Self::new(config, token)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn limit(&self) -> String {
        self.config.page_size.to_string()
    }
}

#[async_trait]
impl InsightsApi for GraphApi {
    async fn request_report(&self, request: &ReportRequest) -> Result<JobId> {
        let path = format!(
            "/{}{}/insights",
            self.config.account_prefix, request.account_id
        );
        let body: Value = self
            .http
            .post_json(&path, RequestConfig::new().json(request.to_body()))
            .await?;

        match body.get("report_run_id") {
            Some(Value::String(id)) => Ok(JobId::new(id.clone())),
            Some(Value::Number(id)) => Ok(JobId::new(id.to_string())),
            _ => Err(Error::decode(format!(
                "report submission returned no report_run_id: {body}"
            ))),
        }
    }

    async fn report_status(&self, job: &JobId) -> Result<ReportStatus> {
        let body: Value = self
            .http
            .get_json(&format!("/{job}"), RequestConfig::new())
            .await?;
        ReportStatus::from_payload(body)
            .map_err(|e| Error::decode(format!("report {job} status: {e}")))
    }

    async fn fetch_page(&self, job: &JobId, cursor: Option<&Cursor>) -> Result<Page> {
        let config = self
            .paginator
            .request(cursor)
            .query("limit", self.limit());
        let body: Value = self
            .http
            .get_json(&format!("/{job}/insights"), config)
            .await?;
        self.paginator.page(body)
    }

    async fn list_accounts(&self, business_id: &str, edge: AccountEdge) -> Result<Vec<Account>> {
        let path = format!("/{business_id}/{}", edge.as_str());
        let mut accounts = Vec::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            let config = self
                .paginator
                .request(cursor.as_ref())
                .query("limit", self.limit());
            let body: Value = self.http.get_json(&path, config).await?;
            let page = self.paginator.page(body)?;

            for row in &page.records {
                let id = row
                    .get("account_id")
                    .and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        Error::decode(format!("{path}: account row without account_id"))
                    })?;
                accounts.push(Account::new(id));
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(business = business_id, edge = edge.as_str(), count = accounts.len(), "Listed accounts");
        Ok(accounts)
    }
}
