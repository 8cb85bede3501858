//! Task queue
//!
//! Dispatched work units leave the process as named tasks on a durable
//! queue. Delivery, retries and backoff are the queue's business.

mod cloud_tasks;
mod memory;

pub use cloud_tasks::{CloudTasksConfig, CloudTasksQueue, CLOUD_TASKS_URL};
pub use memory::InMemoryQueue;

use crate::error::Result;
use crate::orchestrator::WorkUnit;
use async_trait::async_trait;
use uuid::Uuid;

/// A named unit of queued work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// `{pipeline}-{account}-{suffix}`, unique per dispatch
    pub name: String,
    pub payload: WorkUnit,
}

impl Task {
    /// Build a task with a fresh random suffix
    pub fn new(payload: WorkUnit) -> Self {
        let name = format!(
            "{}-{}-{}",
            payload.pipeline,
            payload.account_id,
            Uuid::new_v4()
        );
        Self { name, payload }
    }

    /// JSON body delivered to the callback
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload)?)
    }
}

/// Accepts tasks for later delivery
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Create a task, returning the queue's name for it
    async fn create_task(&self, task: &Task) -> Result<String>;
}
