//! Sink module
//!
//! Transformed rows are appended to one warehouse table per pipeline and
//! account. Rows travel as newline-delimited JSON whatever the warehouse.
//!
//! # Overview
//!
//! - [`Warehouse`]: creates or verifies tables and starts append loads
//! - [`LocalWarehouse`]: NDJSON files on disk
//! - [`BigQueryWarehouse`]: BigQuery tables loaded from staged files
//! - [`SinkWriter`] / [`WriteHandle`]: buffered, scoped writes

mod bigquery;
mod local;
mod staging;
mod writer;

pub use bigquery::{BigQueryConfig, BigQueryWarehouse, BIGQUERY_URL};
pub use local::LocalWarehouse;
pub use staging::StagingArea;
pub use writer::{SinkWriter, SinkWriterConfig, WriteHandle};

use crate::error::Result;
use crate::pipeline::TableSchema;
use async_trait::async_trait;
use bytes::Bytes;

/// A destination holding append-only tables
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the table if absent, otherwise check its schema matches
    ///
    /// Fails with `SchemaMismatch` when an existing table disagrees with
    /// `schema`. Existing rows are never touched.
    async fn ensure_table(&self, table: &str, schema: &TableSchema) -> Result<()>;

    /// Start an append load into `table`
    async fn begin_load(&self, table: &str, schema: &TableSchema) -> Result<Box<dyn LoadJob>>;
}

/// One in-progress append
#[async_trait]
pub trait LoadJob: Send {
    /// Add a chunk of complete NDJSON lines
    async fn append(&mut self, chunk: Bytes) -> Result<()>;

    /// Make every appended chunk durable
    async fn commit(self: Box<Self>) -> Result<()>;
}
