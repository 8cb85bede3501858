//! Dispatcher and its report

use crate::error::{Error, Result};
use crate::orchestrator::WorkUnit;
use crate::pipeline::PipelineRegistry;
use crate::provider::AccountDiscovery;
use crate::queue::{Task, TaskQueue};
use crate::types::DateRange;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A task the queue refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    pub name: String,
    pub error: String,
}

/// Outcome of one dispatch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Tasks the queue accepted
    pub created: usize,
    /// Tasks attempted, pipelines times accounts
    pub total: usize,
    pub failed: Vec<FailedTask>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.created == self.total
    }

    /// `PartialDispatch` when some tasks were not created
    pub fn partial_error(&self) -> Option<Error> {
        (!self.is_complete()).then(|| Error::PartialDispatch {
            created: self.created,
            total: self.total,
        })
    }
}

/// Expands a date range into queued tasks
pub struct Dispatcher {
    discovery: AccountDiscovery,
    registry: PipelineRegistry,
    queue: Arc<dyn TaskQueue>,
    business_ids: Vec<String>,
}

impl Dispatcher {
    pub fn new(
        discovery: AccountDiscovery,
        registry: PipelineRegistry,
        queue: Arc<dyn TaskQueue>,
        business_ids: Vec<String>,
    ) -> Self {
        Self {
            discovery,
            registry,
            queue,
            business_ids,
        }
    }

    /// Build the task for every (pipeline, account) pair
    pub async fn plan(&self, range: DateRange) -> Result<Vec<Task>> {
        let accounts = self.discovery.discover(&self.business_ids).await?;

        Ok(self
            .registry
            .iter()
            .flat_map(|pipeline| {
                accounts.iter().map(move |account| {
                    Task::new(WorkUnit::new(
                        pipeline.name.as_str(),
                        account.account_id.as_str(),
                        range,
                    ))
                })
            })
            .collect())
    }

    /// Discover accounts and submit every task concurrently
    ///
    /// A refused task does not stop the others. Fails only when discovery
    /// fails or when no task at all could be created.
    pub async fn dispatch(&self, range: DateRange) -> Result<DispatchReport> {
        let tasks = self.plan(range).await?;
        let total = tasks.len();

        info!(
            range = %range,
            pipelines = self.registry.len(),
            tasks = total,
            "Dispatching tasks"
        );

        let results = join_all(tasks.iter().map(|task| self.queue.create_task(task))).await;

        let mut created = 0;
        let mut failed = Vec::new();
        for (task, result) in tasks.iter().zip(results) {
            match result {
                Ok(_) => created += 1,
                Err(e) => {
                    warn!(task = %task.name, error = %e, "Task creation failed");
                    failed.push(FailedTask {
                        name: task.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let report = DispatchReport {
            created,
            total,
            failed,
        };

        if created == 0 && total > 0 {
            return Err(Error::PartialDispatch { created, total });
        }
        if report.is_complete() {
            info!(created, "Dispatch complete");
        } else {
            warn!(created, total, "Dispatch partially succeeded");
        }
        Ok(report)
    }
}
