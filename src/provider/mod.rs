//! Report provider
//!
//! The [`InsightsApi`] trait is the seam between the pipeline and the ads
//! Graph API: report submission, status polls, result pages and account
//! discovery. [`GraphApi`] talks to the real service; tests substitute their
//! own implementations or point `GraphApi` at a mock server.

mod accounts;
mod graph;
mod job;
mod types;

pub use accounts::{AccountDiscovery, AccountEdge};
pub use graph::{GraphApi, GraphConfig, GRAPH_API_URL};
pub use job::{PollConfig, ReportJobClient};
pub use types::{JobStatus, ReportJob, ReportRequest, ReportStatus};

use crate::error::Result;
use crate::pagination::Page;
use crate::types::{Account, Cursor, JobId};
use async_trait::async_trait;

/// Operations the pipeline needs from the report provider
///
/// Every method is one network round-trip; nothing is cached.
#[async_trait]
pub trait InsightsApi: Send + Sync {
    /// Submit an asynchronous report
    async fn request_report(&self, request: &ReportRequest) -> Result<JobId>;

    /// Current status of a report
    async fn report_status(&self, job: &JobId) -> Result<ReportStatus>;

    /// One page of a completed report's rows; `None` fetches the first page
    async fn fetch_page(&self, job: &JobId, cursor: Option<&Cursor>) -> Result<Page>;

    /// Ad accounts reachable from a business through one edge
    async fn list_accounts(&self, business_id: &str, edge: AccountEdge) -> Result<Vec<Account>>;
}
