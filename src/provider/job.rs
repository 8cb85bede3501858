//! Report job submission and polling

use super::types::{JobStatus, ReportJob, ReportRequest};
use super::InsightsApi;
use crate::error::{Error, Result};
use crate::types::JobId;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often and how long to poll a report
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between status polls
    pub interval_secs: u64,
    /// Polls before giving up with `PollTimeout`
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 360,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Submits report jobs and waits for them to finish
pub struct ReportJobClient {
    api: Arc<dyn InsightsApi>,
    interval: Duration,
    max_attempts: u32,
}

impl ReportJobClient {
    pub fn new(api: Arc<dyn InsightsApi>, poll: &PollConfig) -> Self {
        Self {
            api,
            interval: poll.interval(),
            max_attempts: poll.max_attempts,
        }
    }

    /// Override the poll interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Submit a report request
    pub async fn submit(&self, request: &ReportRequest) -> Result<JobId> {
        let job_id = self.api.request_report(request).await?;
        info!(
            job_id = %job_id,
            account_id = %request.account_id,
            range = %request.range,
            level = %request.level,
            "Report submitted"
        );
        Ok(job_id)
    }

    /// Poll until the report is completed
    ///
    /// Returns the same id once the provider reports `Completed` at 100%.
    /// Fails with `ReportFailed` carrying the provider payload, or with
    /// `PollTimeout` after `max_attempts` polls.
    pub async fn await_completion(&self, job_id: &JobId) -> Result<JobId> {
        let max_attempts = self.max_attempts.max(1);
        let mut job = ReportJob::new(job_id.clone());

        for attempt in 1..=max_attempts {
            let status = self.api.report_status(job_id).await?;
            let observed = status.status();
            let percent = status.percent();

            if !job.observe(observed, percent) {
                warn!(
                    job_id = %job_id,
                    current = %job.status,
                    observed = %observed,
                    "Ignoring report status regression"
                );
            }

            debug!(
                job_id = %job_id,
                attempt,
                status = %job.status,
                percent = job.percent_complete,
                "Polled report"
            );

            if job.status == JobStatus::Failed {
                return Err(Error::ReportFailed {
                    report_id: job_id.to_string(),
                    payload: status.payload,
                });
            }

            if job.is_complete() {
                info!(job_id = %job_id, polls = attempt, "Report completed");
                return Ok(job_id.clone());
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(Error::PollTimeout {
            report_id: job_id.to_string(),
            attempts: max_attempts,
        })
    }
}
