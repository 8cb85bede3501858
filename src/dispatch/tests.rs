//! Tests for the dispatch module

use super::*;
use crate::error::{Error, Result};
use crate::pagination::Page;
use crate::pipeline::PipelineRegistry;
use crate::provider::{AccountDiscovery, AccountEdge, InsightsApi, ReportRequest, ReportStatus};
use crate::queue::InMemoryQueue;
use crate::types::{Account, Cursor, DateRange, JobId};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

/// Provider that only knows how to list accounts
struct Accounts {
    client: Vec<&'static str>,
    owned: Vec<&'static str>,
}

#[async_trait]
impl InsightsApi for Accounts {
    async fn request_report(&self, _request: &ReportRequest) -> Result<JobId> {
        Err(Error::Other("not used".to_string()))
    }

    async fn report_status(&self, _job: &JobId) -> Result<ReportStatus> {
        Err(Error::Other("not used".to_string()))
    }

    async fn fetch_page(&self, _job: &JobId, _cursor: Option<&Cursor>) -> Result<Page> {
        Err(Error::Other("not used".to_string()))
    }

    async fn list_accounts(&self, business_id: &str, edge: AccountEdge) -> Result<Vec<Account>> {
        if business_id == "broken" {
            return Err(Error::remote(403, "Permissions error"));
        }
        let ids = match edge {
            AccountEdge::ClientAdAccounts => &self.client,
            AccountEdge::OwnedAdAccounts => &self.owned,
        };
        Ok(ids.iter().map(|id| Account::new(*id)).collect())
    }
}

fn dispatcher(api: Accounts, queue: Arc<InMemoryQueue>, businesses: &[&str]) -> Dispatcher {
    Dispatcher::new(
        AccountDiscovery::new(Arc::new(api)),
        PipelineRegistry::builtin().clone(),
        queue,
        businesses.iter().map(ToString::to_string).collect(),
    )
}

fn range() -> DateRange {
    DateRange::parse("2024-01-01", "2024-01-07").unwrap()
}

#[tokio::test]
async fn test_dispatch_fans_out_pipelines_times_accounts() {
    let queue = Arc::new(InMemoryQueue::new());
    let api = Accounts {
        client: vec!["1", "2"],
        owned: vec!["3"],
    };

    let report = dispatcher(api, queue.clone(), &["biz"])
        .dispatch(range())
        .await
        .unwrap();

    let pipelines = PipelineRegistry::builtin().len();
    assert_eq!(report.total, pipelines * 3);
    assert_eq!(report.created, pipelines * 3);
    assert!(report.is_complete());
    assert!(report.partial_error().is_none());

    let tasks = queue.tasks();
    let names: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), tasks.len());

    let pairs: HashSet<(String, String)> = tasks
        .iter()
        .map(|t| (t.payload.pipeline.clone(), t.payload.account_id.clone()))
        .collect();
    assert_eq!(pairs.len(), pipelines * 3);
    assert!(tasks
        .iter()
        .all(|t| t.payload.start == "2024-01-01" && t.payload.end == "2024-01-07"));
}

#[tokio::test]
async fn test_dispatch_deduplicates_accounts_across_edges() {
    let queue = Arc::new(InMemoryQueue::new());
    let api = Accounts {
        client: vec!["1", "2"],
        owned: vec!["2"],
    };

    let report = dispatcher(api, queue.clone(), &["biz"])
        .dispatch(range())
        .await
        .unwrap();
    assert_eq!(report.total, PipelineRegistry::builtin().len() * 2);
}

#[tokio::test]
async fn test_repeated_dispatch_never_reuses_names() {
    let queue = Arc::new(InMemoryQueue::new());
    let api = Accounts {
        client: vec!["1"],
        owned: vec![],
    };
    let dispatcher = dispatcher(api, queue.clone(), &["biz"]);

    dispatcher.dispatch(range()).await.unwrap();
    dispatcher.dispatch(range()).await.unwrap();

    let tasks = queue.tasks();
    let names: HashSet<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tasks.len(), PipelineRegistry::builtin().len() * 2);
    assert_eq!(names.len(), tasks.len());
}

#[tokio::test]
async fn test_partial_dispatch_counts_successes() {
    let queue = Arc::new(InMemoryQueue::new().fail_matching("DeviceInsights-"));
    let api = Accounts {
        client: vec!["1", "2"],
        owned: vec![],
    };

    let report = dispatcher(api, queue.clone(), &["biz"])
        .dispatch(range())
        .await
        .unwrap();

    let pipelines = PipelineRegistry::builtin().len();
    assert_eq!(report.total, pipelines * 2);
    assert_eq!(report.created, (pipelines - 1) * 2);
    assert_eq!(report.failed.len(), 2);
    assert!(report
        .failed
        .iter()
        .all(|f| f.name.starts_with("DeviceInsights-")));
    assert_eq!(queue.len(), report.created);

    match report.partial_error() {
        Some(Error::PartialDispatch { created, total }) => {
            assert_eq!((created, total), (report.created, report.total));
        }
        other => panic!("Expected PartialDispatch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dispatch_with_every_task_refused_fails() {
    let queue = Arc::new(InMemoryQueue::new().fail_matching(""));
    let api = Accounts {
        client: vec!["1"],
        owned: vec![],
    };

    let err = dispatcher(api, queue, &["biz"])
        .dispatch(range())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PartialDispatch { created: 0, .. }));
}

#[tokio::test]
async fn test_no_accounts_dispatches_nothing() {
    let queue = Arc::new(InMemoryQueue::new());
    let api = Accounts {
        client: vec![],
        owned: vec![],
    };

    let report = dispatcher(api, queue.clone(), &["biz"])
        .dispatch(range())
        .await
        .unwrap();
    assert_eq!(report.total, 0);
    assert!(report.is_complete());
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_discovery_failure_aborts_dispatch() {
    let queue = Arc::new(InMemoryQueue::new());
    let api = Accounts {
        client: vec!["1"],
        owned: vec![],
    };

    let err = dispatcher(api, queue.clone(), &["biz", "broken"])
        .dispatch(range())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteRequest { status: 403, .. }));
    assert!(queue.is_empty());
}
