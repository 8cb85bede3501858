//! Buffered NDJSON writer over a warehouse

use super::{LoadJob, Warehouse};
use crate::error::{Error, Result};
use crate::pipeline::TableSchema;
use crate::transform::EnrichedRecord;
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for the sink writer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SinkWriterConfig {
    /// Buffered bytes that trigger a chunk flush
    pub flush_bytes: usize,
}

impl Default for SinkWriterConfig {
    fn default() -> Self {
        Self {
            flush_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Opens write handles against a warehouse
#[derive(Clone)]
pub struct SinkWriter {
    warehouse: Arc<dyn Warehouse>,
    config: SinkWriterConfig,
}

impl SinkWriter {
    pub fn new(warehouse: Arc<dyn Warehouse>, config: SinkWriterConfig) -> Self {
        Self { warehouse, config }
    }

    /// Declare `schema` on `table` and start appending to it
    pub async fn open(&self, table: &str, schema: &TableSchema) -> Result<WriteHandle> {
        self.warehouse.ensure_table(table, schema).await?;
        let load = self.warehouse.begin_load(table, schema).await?;

        debug!(table, "Write handle opened");
        Ok(WriteHandle {
            table: table.to_string(),
            load: Some(load),
            buffer: Vec::new(),
            flush_bytes: self.config.flush_bytes.max(1),
            rows: 0,
            chunks: 0,
        })
    }
}

/// Scoped append to one table
///
/// Call [`WriteHandle::close`] on every path, including after a failed
/// write, so that buffered rows are flushed and the load is committed.
pub struct WriteHandle {
    table: String,
    load: Option<Box<dyn LoadJob>>,
    buffer: Vec<u8>,
    flush_bytes: usize,
    rows: usize,
    chunks: usize,
}

impl WriteHandle {
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Rows accepted so far
    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Append one record
    pub async fn write(&mut self, record: &EnrichedRecord) -> Result<()> {
        let line = record.to_ndjson_line()?;
        self.write_line(&line).await
    }

    /// Append one serialized record
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches('\n');
        if line.is_empty() || line.contains('\n') {
            return Err(Error::sink(format!(
                "{}: a row must be exactly one line",
                self.table
            )));
        }

        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        self.rows += 1;

        if self.buffer.len() >= self.flush_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let load = self
            .load
            .as_mut()
            .ok_or_else(|| Error::sink(format!("{}: handle already closed", self.table)))?;

        let chunk = Bytes::from(std::mem::take(&mut self.buffer));
        let size = chunk.len();
        load.append(chunk).await?;
        self.chunks += 1;

        debug!(table = %self.table, bytes = size, chunk = self.chunks, "Flushed chunk");
        Ok(())
    }

    /// Flush, commit and return the number of rows written
    ///
    /// A failed final flush still commits the chunks appended before it and
    /// then returns the flush error.
    pub async fn close(mut self) -> Result<usize> {
        let flushed = self.flush().await;
        let load = self
            .load
            .take()
            .ok_or_else(|| Error::sink(format!("{}: handle already closed", self.table)))?;
        let committed = load.commit().await;

        if let Err(e) = flushed {
            match committed {
                Ok(()) => warn!(
                    table = %self.table,
                    chunks = self.chunks,
                    "Final flush failed; earlier chunks committed"
                ),
                Err(commit_err) => warn!(
                    table = %self.table,
                    error = %commit_err,
                    "Commit after failed flush also failed"
                ),
            }
            return Err(e);
        }

        committed?;
        info!(table = %self.table, rows = self.rows, "Write handle closed");
        Ok(self.rows)
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        if self.load.is_some() {
            warn!(
                table = %self.table,
                rows = self.rows,
                "Write handle dropped without close; buffered rows are lost"
            );
        }
    }
}
