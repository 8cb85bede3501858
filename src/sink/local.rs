//! Warehouse backed by local NDJSON files

use super::{LoadJob, Warehouse};
use crate::error::{Error, Result};
use crate::pipeline::TableSchema;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// One directory per dataset; each table is `{table}.schema.json` plus an
/// append-only `{table}.ndjson`
#[derive(Debug, Clone)]
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schema_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.schema.json"))
    }

    pub fn data_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.ndjson"))
    }
}

#[async_trait]
impl Warehouse for LocalWarehouse {
    async fn ensure_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        let schema_path = self.schema_path(table);

        match fs::read_to_string(&schema_path).await {
            Ok(existing) => {
                let existing: TableSchema = serde_json::from_str(&existing).map_err(|e| {
                    Error::sink(format!("{}: unreadable schema: {e}", schema_path.display()))
                })?;
                if let Some(conflict) = schema.conflict_with(&existing) {
                    return Err(Error::schema_mismatch(table, conflict));
                }
                debug!(table, "Table exists with matching schema");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&self.root).await?;
                let json = serde_json::to_string_pretty(schema)?;
                fs::write(&schema_path, json).await?;
                info!(table, path = %schema_path.display(), "Created table");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn begin_load(&self, table: &str, _schema: &TableSchema) -> Result<Box<dyn LoadJob>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.data_path(table))
            .await?;
        Ok(Box::new(LocalLoad { file }))
    }
}

struct LocalLoad {
    file: File,
}

#[async_trait]
impl LoadJob for LocalLoad {
    async fn append(&mut self, chunk: Bytes) -> Result<()> {
        self.file.write_all(&chunk).await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}
