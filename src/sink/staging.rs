//! Staging storage for warehouse load files (GCS or local)

use crate::error::{Error, Result};
use bytes::Bytes;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use std::sync::Arc;

/// Where NDJSON chunks wait before a load job picks them up
#[derive(Debug, Clone)]
pub struct StagingArea {
    store: Arc<dyn ObjectStore>,
    /// Bucket name for `gs`, directory for `file`
    root: String,
    /// Path prefix within the bucket
    prefix: String,
    scheme: String,
}

impl StagingArea {
    /// Parse a staging URL
    ///
    /// Supported formats:
    /// - `gs://bucket/path/` - Google Cloud Storage
    /// - `/local/path/` or `file:///local/path/` - Local filesystem
    pub fn parse(url: &str, credentials: Option<&Path>) -> Result<Self> {
        if url.starts_with("gs://") {
            Self::parse_gcs(url, credentials)
        } else {
            Self::parse_local(url)
        }
    }

    fn parse_gcs(url: &str, credentials: Option<&Path>) -> Result<Self> {
        let without_scheme = url
            .strip_prefix("gs://")
            .ok_or_else(|| Error::config(format!("Invalid GCS URL: {url}")))?;

        let (bucket, prefix) = match without_scheme.find('/') {
            Some(idx) => (
                &without_scheme[..idx],
                without_scheme[idx + 1..].trim_end_matches('/').to_string(),
            ),
            None => (without_scheme, String::new()),
        };
        if bucket.is_empty() {
            return Err(Error::config(format!("GCS URL has no bucket: {url}")));
        }

        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        if let Some(path) = credentials {
            builder = builder.with_service_account_path(path.to_string_lossy());
        }
        let store = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to create GCS client: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            root: bucket.to_string(),
            prefix,
            scheme: "gs".to_string(),
        })
    }

    fn parse_local(path: &str) -> Result<Self> {
        let path = path.strip_prefix("file://").unwrap_or(path);

        std::fs::create_dir_all(path)
            .map_err(|e| Error::config(format!("Failed to create directory {path}: {e}")))?;

        let store = LocalFileSystem::new_with_prefix(path)
            .map_err(|e| Error::config(format!("Failed to create local store: {e}")))?;

        Ok(Self {
            store: Arc::new(store),
            root: path.trim_end_matches('/').to_string(),
            prefix: String::new(),
            scheme: "file".to_string(),
        })
    }

    /// Check if this is a cloud destination (not local)
    pub fn is_cloud(&self) -> bool {
        self.scheme != "file"
    }

    fn object_path(&self, name: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(name)
        } else {
            ObjectPath::from(format!("{}/{name}", self.prefix))
        }
    }

    /// Store one chunk, returning the URI a load job can read it from
    pub async fn put(&self, name: &str, data: Bytes) -> Result<String> {
        let path = self.object_path(name);

        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| Error::sink(format!("Failed to stage {path}: {e}")))?;

        Ok(format!("{}://{}/{path}", self.scheme, self.root))
    }

    /// Remove a staged chunk
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.object_path(name);
        self.store
            .delete(&path)
            .await
            .map_err(|e| Error::sink(format!("Failed to delete {path}: {e}")))
    }
}
