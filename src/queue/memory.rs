//! In-process queue

use super::{Task, TaskQueue};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// Collects tasks in memory instead of submitting them
///
/// Tasks whose name starts with a registered prefix are refused, which lets
/// callers exercise partial dispatch.
#[derive(Default)]
pub struct InMemoryQueue {
    tasks: Mutex<Vec<Task>>,
    failing: Vec<String>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse tasks whose name starts with `prefix`
    #[must_use]
    pub fn fail_matching(mut self, prefix: impl Into<String>) -> Self {
        self.failing.push(prefix.into());
        self
    }

    /// Tasks accepted so far, in submission order
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn create_task(&self, task: &Task) -> Result<String> {
        if self.failing.iter().any(|p| task.name.starts_with(p)) {
            return Err(Error::queue(format!("{}: refused", task.name)));
        }
        self.tasks
            .lock()
            .map_err(|_| Error::queue("queue lock poisoned"))?
            .push(task.clone());
        Ok(task.name.clone())
    }
}
