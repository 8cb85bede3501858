//! Google Cloud Tasks over its REST API

use super::{Task, TaskQueue};
use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Default Cloud Tasks endpoint
pub const CLOUD_TASKS_URL: &str = "https://cloudtasks.googleapis.com/v2";

/// Queue coordinates and delivery target
#[derive(Debug, Clone)]
pub struct CloudTasksConfig {
    pub project: String,
    pub location: String,
    pub queue: String,
    pub base_url: String,
    /// Absolute URL every task is POSTed to
    pub callback_url: String,
    /// Identity asserted by the OIDC token on delivery
    pub service_account_email: String,
}

impl CloudTasksConfig {
    /// `projects/{project}/locations/{location}/queues/{queue}`
    pub fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project, self.location, self.queue
        )
    }
}

/// Cloud Tasks queue with HTTP targets
pub struct CloudTasksQueue {
    http: HttpClient,
    config: CloudTasksConfig,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    name: String,
}

impl CloudTasksQueue {
    pub fn new(config: CloudTasksConfig, auth: AuthConfig) -> Result<Self> {
        let http = HttpClient::with_auth(
            HttpClientConfig::builder()
                .base_url(config.base_url.clone())
                .no_rate_limit()
                .build(),
            auth,
        )?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CloudTasksConfig {
        &self.config
    }
}

#[async_trait]
impl TaskQueue for CloudTasksQueue {
    async fn create_task(&self, task: &Task) -> Result<String> {
        let queue_path = self.config.queue_path();
        let body = json!({
            "task": {
                "name": format!("{queue_path}/tasks/{}", task.name),
                "httpRequest": {
                    "httpMethod": "POST",
                    "url": self.config.callback_url,
                    "headers": { "Content-Type": "application/json" },
                    "body": STANDARD.encode(task.body()?),
                    "oidcToken": {
                        "serviceAccountEmail": self.config.service_account_email,
                    },
                },
            }
        });

        let created: CreatedTask = self
            .http
            .post_json(&format!("{queue_path}/tasks"), RequestConfig::new().json(body))
            .await
            .map_err(|e| Error::queue(format!("{}: {e}", task.name)))?;

        debug!(task = %created.name, "Task created");
        Ok(created.name)
    }
}
