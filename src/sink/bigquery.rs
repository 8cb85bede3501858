//! BigQuery warehouse over its REST API
//!
//! Tables are created or verified through the tables API. Rows are staged as
//! NDJSON objects and committed by a single load job per write handle.

use super::staging::StagingArea;
use super::{LoadJob, Warehouse};
use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::pipeline::TableSchema;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default BigQuery endpoint
pub const BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Where tables live and how load jobs are awaited
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project: String,
    pub dataset: String,
    pub base_url: String,
    /// Job location, when the dataset is not in the default one
    pub location: Option<String>,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl BigQueryConfig {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            base_url: BIGQUERY_URL.to_string(),
            location: None,
            poll_interval: Duration::from_secs(2),
            max_polls: 900,
        }
    }
}

/// BigQuery dataset used as a warehouse
pub struct BigQueryWarehouse {
    http: HttpClient,
    config: BigQueryConfig,
    staging: StagingArea,
}

#[derive(Debug, Deserialize)]
struct TableResource {
    #[serde(default)]
    schema: TableSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: JobState,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobState {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<Value>,
}

impl BigQueryWarehouse {
    pub fn new(config: BigQueryConfig, staging: StagingArea, auth: AuthConfig) -> Result<Self> {
        let http = HttpClient::with_auth(
            HttpClientConfig::builder()
                .base_url(config.base_url.clone())
                .no_rate_limit()
                .build(),
            auth,
        )?;
        Ok(Self {
            http,
            config,
            staging,
        })
    }

    fn tables_path(&self) -> String {
        format!(
            "projects/{}/datasets/{}/tables",
            self.config.project, self.config.dataset
        )
    }

    async fn get_table(&self, table: &str) -> Result<Option<TableSchema>> {
        let path = format!("{}/{table}", self.tables_path());
        match self
            .http
            .get_json::<TableResource>(&path, RequestConfig::new())
            .await
        {
            Ok(resource) => Ok(Some(resource.schema)),
            Err(Error::RemoteRequest { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn insert_table(&self, table: &str, schema: &TableSchema) -> Result<bool> {
        let body = json!({
            "tableReference": {
                "projectId": self.config.project,
                "datasetId": self.config.dataset,
                "tableId": table,
            },
            "schema": schema,
        });
        match self
            .http
            .post_with_config(&self.tables_path(), RequestConfig::new().json(body))
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::RemoteRequest { status: 409, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn verify(table: &str, wanted: &TableSchema, existing: &TableSchema) -> Result<()> {
        match wanted.conflict_with(existing) {
            Some(conflict) => Err(Error::schema_mismatch(table, conflict)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn ensure_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        if let Some(existing) = self.get_table(table).await? {
            Self::verify(table, schema, &existing)?;
            debug!(table, "Table exists with matching schema");
            return Ok(());
        }

        if self.insert_table(table, schema).await? {
            info!(table, dataset = %self.config.dataset, "Created table");
            return Ok(());
        }

        // Another run created it between our read and insert
        let existing = self
            .get_table(table)
            .await?
            .ok_or_else(|| Error::sink(format!("{table}: table vanished after conflict")))?;
        Self::verify(table, schema, &existing)
    }

    async fn begin_load(&self, table: &str, schema: &TableSchema) -> Result<Box<dyn LoadJob>> {
        Ok(Box::new(BigQueryLoad {
            http: self.http.clone(),
            config: self.config.clone(),
            staging: self.staging.clone(),
            table: table.to_string(),
            schema: schema.clone(),
            load_id: Uuid::new_v4().to_string(),
            staged: Vec::new(),
        }))
    }
}

/// Chunks staged so far for one load
struct BigQueryLoad {
    http: HttpClient,
    config: BigQueryConfig,
    staging: StagingArea,
    table: String,
    schema: TableSchema,
    load_id: String,
    /// (object name, uri)
    staged: Vec<(String, String)>,
}

impl BigQueryLoad {
    fn object_name(&self, part: usize) -> String {
        format!(
            "loads/{}/{}/part-{part:05}.ndjson",
            self.table, self.load_id
        )
    }

    async fn submit(&self) -> Result<JobReference> {
        let uris: Vec<&str> = self.staged.iter().map(|(_, uri)| uri.as_str()).collect();
        let body = json!({
            "configuration": {
                "load": {
                    "sourceUris": uris,
                    "destinationTable": {
                        "projectId": self.config.project,
                        "datasetId": self.config.dataset,
                        "tableId": self.table,
                    },
                    "schema": self.schema,
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "writeDisposition": "WRITE_APPEND",
                }
            }
        });

        let path = format!("projects/{}/jobs", self.config.project);
        let job: JobResource = self
            .http
            .post_json(&path, RequestConfig::new().json(body))
            .await?;
        Self::check(&self.table, &job.status)?;
        Ok(job.job_reference)
    }

    async fn wait(&self, job: &JobReference) -> Result<()> {
        let path = format!("projects/{}/jobs/{}", self.config.project, job.job_id);
        let location = job.location.clone().or_else(|| self.config.location.clone());
        let max_polls = self.config.max_polls.max(1);

        for attempt in 1..=max_polls {
            let resource: JobResource = self
                .http
                .get_json(&path, RequestConfig::new().query_opt("location", location.clone()))
                .await?;
            Self::check(&self.table, &resource.status)?;

            if resource.status.state == "DONE" {
                return Ok(());
            }
            debug!(table = %self.table, job_id = %job.job_id, attempt, state = %resource.status.state, "Load job pending");
            tokio::time::sleep(self.config.poll_interval).await;
        }

        Err(Error::sink(format!(
            "{}: load job {} not done after {max_polls} polls",
            self.table, job.job_id
        )))
    }

    fn check(table: &str, status: &JobState) -> Result<()> {
        match &status.error_result {
            Some(err) => Err(Error::sink(format!("{table}: load job failed: {err}"))),
            None => Ok(()),
        }
    }

    async fn cleanup(&self) {
        for (name, _) in &self.staged {
            if let Err(e) = self.staging.delete(name).await {
                warn!(table = %self.table, object = %name, error = %e, "Failed to remove staged chunk");
            }
        }
    }
}

#[async_trait]
impl LoadJob for BigQueryLoad {
    async fn append(&mut self, chunk: Bytes) -> Result<()> {
        let name = self.object_name(self.staged.len());
        let uri = self.staging.put(&name, chunk).await?;
        self.staged.push((name, uri));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.staged.is_empty() {
            debug!(table = %self.table, "Nothing staged, skipping load job");
            return Ok(());
        }

        let result = match self.submit().await {
            Ok(job) => {
                info!(table = %self.table, job_id = %job.job_id, chunks = self.staged.len(), "Load job submitted");
                self.wait(&job).await
            }
            Err(e) => Err(e),
        };
        self.cleanup().await;
        result
    }
}
