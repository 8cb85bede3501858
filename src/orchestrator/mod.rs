//! Run orchestrator
//!
//! Runs one work unit end to end:
//!
//! ```text
//! Idle -> RequestingReport -> Polling -> ExtractingLoading -> Succeeded
//!   \________________\_____________\_____________\___________> Failed
//! ```
//!
//! Errors are logged and returned, never retried here; the queue redelivers
//! the originating task.

mod runner;
mod types;

pub use runner::RunOrchestrator;
pub use types::{RunState, RunSummary, WorkUnit};
