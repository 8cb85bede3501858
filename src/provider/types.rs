//! Report request and job status types

use crate::pipeline::PipelineDefinition;
use crate::types::{DateRange, JobId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

/// Parameters of one asynchronous report; immutable once submitted
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub account_id: String,
    pub range: DateRange,
    pub level: String,
    pub fields: Vec<String>,
    pub breakdowns: Option<String>,
    pub attribution_windows: Vec<String>,
    pub filtering: Vec<Value>,
}

impl ReportRequest {
    /// The report a pipeline needs for one account and range
    pub fn for_pipeline(pipeline: &PipelineDefinition, account_id: &str, range: DateRange) -> Self {
        Self {
            account_id: account_id.to_string(),
            range,
            level: pipeline.level.clone(),
            fields: pipeline.fields.clone(),
            breakdowns: pipeline.breakdowns.clone(),
            attribution_windows: pipeline.attribution_windows.clone(),
            filtering: pipeline.filtering.clone(),
        }
    }

    /// JSON body of the report submission
    ///
    /// `time_range` is itself a JSON-encoded string, as the provider expects.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "level": self.level,
            "fields": self.fields,
            "time_range": json!({"since": self.range.since(), "until": self.range.until()}).to_string(),
            "time_increment": 1,
        });
        if let Some(breakdowns) = &self.breakdowns {
            body["breakdowns"] = json!(breakdowns);
        }
        if !self.attribution_windows.is_empty() {
            body["action_attribution_windows"] = json!(self.attribution_windows);
        }
        if !self.filtering.is_empty() {
            body["filtering"] = json!(self.filtering);
        }
        body
    }
}

/// Lifecycle of a report job
///
/// Ordered: a job only ever moves to a later state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStatus {
    Requested,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map the provider's `async_status` string
    ///
    /// Skipped jobs never produce data and count as failed. Unrecognized
    /// strings are treated as still running.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "Job Not Started" => JobStatus::Requested,
            "Job Completed" => JobStatus::Completed,
            "Job Failed" | "Job Skipped" => JobStatus::Failed,
            _ => JobStatus::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Requested => "Requested",
            JobStatus::Running => "Running",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One status poll response
#[derive(Debug, Clone, Deserialize)]
pub struct ReportStatus {
    #[serde(default)]
    pub async_percent_completion: f64,
    pub async_status: String,
    /// Full response, kept for diagnostics
    #[serde(skip)]
    pub payload: Value,
}

impl ReportStatus {
    pub fn from_payload(payload: Value) -> serde_json::Result<Self> {
        let mut status: ReportStatus = serde_json::from_value(payload.clone())?;
        status.payload = payload;
        Ok(status)
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_provider(&self.async_status)
    }

    /// Completion percentage, clamped to 0..=100
    pub fn percent(&self) -> u8 {
        self.async_percent_completion.clamp(0.0, 100.0) as u8
    }
}

/// Client-side view of a submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportJob {
    pub job_id: JobId,
    pub status: JobStatus,
    pub percent_complete: u8,
}

impl ReportJob {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Requested,
            percent_complete: 0,
        }
    }

    /// Record an observed status, ignoring moves backwards
    ///
    /// Returns false when the observation was a regression and was dropped.
    pub fn observe(&mut self, status: JobStatus, percent: u8) -> bool {
        if self.status == JobStatus::Failed || status < self.status {
            return false;
        }
        self.status = status;
        self.percent_complete = self.percent_complete.max(percent.min(100));
        true
    }

    /// Finished with data ready to page through
    pub fn is_complete(&self) -> bool {
        self.status == JobStatus::Completed && self.percent_complete == 100
    }
}
