//! Wiring from settings to running components

use crate::auth::{AuthConfig, OAuthFlow, ServiceAccountKey, CLOUD_PLATFORM_SCOPE};
use crate::config::{QueueBackend, SecretsBackend, Settings, SinkBackend};
use crate::dispatch::{DispatchReport, Dispatcher};
use crate::error::{Error, Result};
use crate::orchestrator::{RunOrchestrator, RunSummary, WorkUnit};
use crate::pipeline::PipelineRegistry;
use crate::provider::{AccountDiscovery, GraphApi};
use crate::queue::{CloudTasksConfig, CloudTasksQueue, InMemoryQueue, TaskQueue};
use crate::secrets::{EnvSecretStore, GcpSecretManager, SecretStore};
use crate::sink::{
    BigQueryConfig, BigQueryWarehouse, LocalWarehouse, SinkWriter, StagingArea, Warehouse,
};
use crate::types::DateRange;
use std::sync::Arc;
use tracing::info;

/// Long-lived components shared by every command and request
///
/// The provider client is not kept here: each run and dispatch builds one
/// with the token currently in the secret store.
pub struct App {
    settings: Settings,
    registry: PipelineRegistry,
    secrets: Arc<dyn SecretStore>,
    queue: Arc<dyn TaskQueue>,
    warehouse: Arc<dyn Warehouse>,
}

impl App {
    /// Assemble from explicit parts
    pub fn new(
        settings: Settings,
        secrets: Arc<dyn SecretStore>,
        queue: Arc<dyn TaskQueue>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            settings,
            registry: PipelineRegistry::builtin().clone(),
            secrets,
            queue,
            warehouse,
        }
    }

    /// Build every backend the settings select
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let google = GoogleAuth::new(&settings);

        let secrets: Arc<dyn SecretStore> = match settings.secrets.backend {
            SecretsBackend::Gcp => Arc::new(GcpSecretManager::with_endpoint(
                settings.secrets_project()?,
                settings.secrets.base_url.clone(),
                google.auth()?,
            )?),
            SecretsBackend::Env => Arc::new(EnvSecretStore::new()),
        };

        let queue: Arc<dyn TaskQueue> = match settings.queue.backend {
            QueueBackend::CloudTasks => {
                let config = CloudTasksConfig {
                    project: settings.queue_project()?,
                    location: settings.queue.location.clone(),
                    queue: settings.queue.queue.clone(),
                    base_url: settings.queue.base_url.clone(),
                    callback_url: settings.callback_url()?,
                    service_account_email: settings
                        .queue
                        .service_account_email
                        .clone()
                        .ok_or_else(|| Error::config("queue.service_account_email is not set"))?,
                };
                Arc::new(CloudTasksQueue::new(config, google.auth()?)?)
            }
            QueueBackend::Memory => Arc::new(InMemoryQueue::new()),
        };

        let warehouse: Arc<dyn Warehouse> = match settings.sink.backend {
            SinkBackend::Local => Arc::new(LocalWarehouse::new(settings.sink.local_dir.clone())),
            SinkBackend::BigQuery => {
                let staging_url = settings
                    .sink
                    .staging_url
                    .as_deref()
                    .ok_or_else(|| Error::config("sink.staging_url is not set"))?;
                let staging =
                    StagingArea::parse(staging_url, settings.google.credentials.as_deref())?;

                let mut config =
                    BigQueryConfig::new(settings.sink_project()?, settings.sink.dataset.clone());
                config.base_url = settings.sink.base_url.clone();
                config.location = settings.sink.location.clone();

                Arc::new(BigQueryWarehouse::new(config, staging, google.auth()?)?)
            }
        };

        info!(
            secrets = ?settings.secrets.backend,
            queue = ?settings.queue.backend,
            sink = ?settings.sink.backend,
            "Backends configured"
        );
        Ok(Self::new(settings, secrets, queue, warehouse))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn secrets(&self) -> Arc<dyn SecretStore> {
        self.secrets.clone()
    }

    async fn graph(&self) -> Result<Arc<GraphApi>> {
        let api = GraphApi::connect(
            self.settings.graph_config(),
            self.secrets.as_ref(),
            &self.settings.provider.token_secret,
        )
        .await?;
        Ok(Arc::new(api))
    }

    /// Run one work unit
    pub async fn run(&self, unit: &WorkUnit) -> Result<RunSummary> {
        let orchestrator = RunOrchestrator::new(
            self.graph().await?,
            self.registry.clone(),
            &self.settings.polling,
            SinkWriter::new(self.warehouse.clone(), self.settings.sink.writer.clone()),
        );
        orchestrator.run(unit).await
    }

    /// Fan a date range out over every pipeline and discovered account
    pub async fn dispatch(&self, range: DateRange) -> Result<DispatchReport> {
        let discovery =
            AccountDiscovery::new(self.graph().await?).deduplicate(self.settings.dispatch.deduplicate);
        let dispatcher = Dispatcher::new(
            discovery,
            self.registry.clone(),
            self.queue.clone(),
            self.settings.dispatch.business_ids.clone(),
        );
        dispatcher.dispatch(range).await
    }

    /// Dispatch window from optional request bounds
    pub fn dispatch_range(&self, start: Option<&str>, end: Option<&str>) -> Result<DateRange> {
        DateRange::parse_or_trailing(start, end, self.settings.dispatch.default_days)
    }

    pub fn oauth(&self) -> Result<OAuthFlow> {
        OAuthFlow::new(self.settings.oauth_config()?, self.secrets.clone())
    }
}

/// Service account credentials, read only when a backend needs them
struct GoogleAuth<'a> {
    settings: &'a Settings,
}

impl<'a> GoogleAuth<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    fn auth(&self) -> Result<AuthConfig> {
        let path = self.settings.google.credentials.as_ref().ok_or_else(|| {
            Error::config("GOOGLE_APPLICATION_CREDENTIALS must point to a service account key")
        })?;
        let key = ServiceAccountKey::from_file(path)?;
        Ok(AuthConfig::service_account(&key, &[CLOUD_PLATFORM_SCOPE]))
    }
}
