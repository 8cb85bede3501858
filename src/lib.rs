//! # Insights Pipeline
//!
//! Extracts asynchronously generated ads insights reports and streams them,
//! validated and timestamped, into one append-only warehouse table per
//! pipeline and account. A dispatcher fans one request out into a queued
//! task per (pipeline, account) pair; each delivered task runs the pipeline
//! once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use insights_pipeline::orchestrator::{RunOrchestrator, WorkUnit};
//! use insights_pipeline::pipeline::PipelineRegistry;
//! use insights_pipeline::provider::{GraphApi, GraphConfig, PollConfig};
//! use insights_pipeline::sink::{LocalWarehouse, SinkWriter, SinkWriterConfig};
//! use insights_pipeline::types::DateRange;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> insights_pipeline::Result<()> {
//!     let api = Arc::new(GraphApi::new(GraphConfig::default(), "EAAB...")?);
//!     let sink = SinkWriter::new(
//!         Arc::new(LocalWarehouse::new("insights-data")),
//!         SinkWriterConfig::default(),
//!     );
//!     let orchestrator = RunOrchestrator::new(
//!         api,
//!         PipelineRegistry::builtin().clone(),
//!         &PollConfig::default(),
//!         sink,
//!     );
//!
//!     let range = DateRange::parse("2024-01-01", "2024-01-02")?;
//!     let summary = orchestrator.run(&WorkUnit::new("AdsInsights", "123", range)).await?;
//!     println!("{} rows into {}", summary.rows_written, summary.table);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  POST /task                                   POST / (one task)
//!      │                                             │
//! ┌────┴───────┐   tasks   ┌───────┐  delivery  ┌────┴─────────────┐
//! │ Dispatcher ├──────────►│ Queue ├───────────►│ RunOrchestrator  │
//! └────┬───────┘           └───────┘            └────┬─────────────┘
//!      │ accounts                                    │
//! ┌────┴─────────────┐   ┌──────────────┬────────────┼─────────────┬────────────┐
//! │ AccountDiscovery │   │ ReportJob    │ Extractor  │ Transformer │ SinkWriter │
//! └──────────────────┘   │ submit/poll  │ page stream│ validate    │ NDJSON     │
//!                        └──────────────┴────────────┴─────────────┴────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Process settings (YAML + environment)
pub mod config;

/// Authentication implementations
pub mod auth;

/// HTTP client with rate limiting
pub mod http;

/// Secret stores
pub mod secrets;

/// Report provider client, job polling and account discovery
pub mod provider;

/// Pages and the record stream
pub mod pagination;

/// Pipeline definitions and registry
pub mod pipeline;

/// Record validation and enrichment
pub mod transform;

/// Warehouse tables and buffered writes
pub mod sink;

/// Task queue
pub mod queue;

/// Fan-out dispatch
pub mod dispatch;

/// One pipeline run, end to end
pub mod orchestrator;

/// Command-line interface and HTTP trigger
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use orchestrator::{RunOrchestrator, RunSummary, WorkUnit};
pub use pipeline::{PipelineDefinition, PipelineRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
