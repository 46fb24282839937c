//! Object storage.
//!
//! Tasks address data as `bucket/key`. [`LocalObjectStore`] maps buckets
//! onto directories below a root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::TaskError;

/// Bucket/key object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read an object.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, TaskError>;

    /// Write an object, replacing any existing one.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), TaskError>;
}

/// Filesystem-backed object store.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` to a path, refusing anything that escapes the bucket.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, TaskError> {
        check_segment("bucket", bucket)?;
        if key.is_empty() {
            return Err(TaskError::InvalidPayload("object key is empty".to_string()));
        }
        let key_path = Path::new(key);
        if !key_path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(TaskError::InvalidPayload(format!(
                "object key '{}' must be a relative path without '..'",
                key
            )));
        }
        Ok(self.root.join(bucket).join(key_path))
    }
}

fn check_segment(what: &str, value: &str) -> Result<(), TaskError> {
    if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(TaskError::InvalidPayload(format!(
            "invalid {} name '{}'",
            what, value
        )));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, TaskError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), "Reading object");

        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => TaskError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => TaskError::Storage(format!("{}: {}", path.display(), e)),
        })
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), TaskError> {
        let path = self.object_path(bucket, key)?;
        debug!(path = %path.display(), bytes = body.len(), "Writing object");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}
