//! Orchestrator types

use crate::error::Result;
use crate::types::DateRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (pipeline, account, date range) unit of work
///
/// This is the payload carried by every queued task and accepted by the run
/// endpoint, so its wire shape is camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    pub account_id: String,
    /// `YYYY-MM-DD`
    pub start: String,
    /// `YYYY-MM-DD`
    pub end: String,
    pub pipeline: String,
}

impl WorkUnit {
    pub fn new(pipeline: impl Into<String>, account_id: impl Into<String>, range: DateRange) -> Self {
        Self {
            account_id: account_id.into(),
            start: range.since(),
            end: range.until(),
            pipeline: pipeline.into(),
        }
    }

    /// The validated date range
    pub fn range(&self) -> Result<DateRange> {
        DateRange::parse(&self.start, &self.end)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}..{}",
            self.pipeline, self.account_id, self.start, self.end
        )
    }
}

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    RequestingReport,
    Polling,
    ExtractingLoading,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `next` is a legal successor
    ///
    /// Every non-terminal state may fail; otherwise states only move forward
    /// one step.
    pub fn can_transition_to(self, next: RunState) -> bool {
        match (self, next) {
            (s, Self::Failed) => !s.is_terminal(),
            (Self::Idle, Self::RequestingReport)
            | (Self::RequestingReport, Self::Polling)
            | (Self::Polling, Self::ExtractingLoading)
            | (Self::ExtractingLoading, Self::Succeeded) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RequestingReport => "requesting_report",
            Self::Polling => "polling",
            Self::ExtractingLoading => "extracting_loading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub pipeline: String,
    pub account_id: String,
    pub job_id: String,
    pub table: String,
    pub rows_written: usize,
}
