//! `extract`: read a CSV object into records.

use std::sync::Arc;

use async_trait::async_trait;
use pipeflow_core::InvocationContext;
use serde_json::{json, Value};
use tracing::info;

use crate::csv::parse_records;
use crate::error::TaskError;
use crate::registry::Task;
use crate::storage::ObjectStore;

/// Reads `{bucket, key}` and returns `{data, source}`.
pub struct ExtractTask {
    store: Arc<dyn ObjectStore>,
    default_bucket: String,
}

impl ExtractTask {
    pub fn new(store: Arc<dyn ObjectStore>, default_bucket: impl Into<String>) -> Self {
        Self {
            store,
            default_bucket: default_bucket.into(),
        }
    }
}

#[async_trait]
impl Task for ExtractTask {
    fn name(&self) -> &'static str {
        "extract"
    }

    async fn execute(&self, payload: Value, ctx: &InvocationContext) -> Result<Value, TaskError> {
        let key = payload
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TaskError::InvalidPayload("payload has no string 'key'".to_string()))?;
        let bucket = payload
            .get("bucket")
            .and_then(Value::as_str)
            .unwrap_or(self.default_bucket.as_str());

        let body = self.store.get(bucket, key).await?;
        let text = String::from_utf8(body).map_err(|_| {
            TaskError::MalformedRecord(format!("{}/{} is not valid UTF-8", bucket, key))
        })?;
        let records = parse_records(&text)?;

        info!(
            execution_id = %ctx.execution_id,
            bucket = %bucket,
            key = %key,
            records = records.len(),
            "Extracted records"
        );

        Ok(json!({
            "data": records,
            "source": {"bucket": bucket, "key": key},
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalObjectStore;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Uuid::new_v4(), "csv_etl", "extract", CancellationToken::new())
    }

    async fn task_with(dir: &tempfile::TempDir, bucket: &str, key: &str, body: &str) -> ExtractTask {
        let store = LocalObjectStore::new(dir.path());
        store.put(bucket, key, body.as_bytes().to_vec()).await.unwrap();
        ExtractTask::new(Arc::new(store), "source")
    }

    #[tokio::test]
    async fn test_extract_records() {
        let dir = tempfile::tempdir().unwrap();
        let task = task_with(&dir, "in", "a.csv", "name\nana\n").await;

        let out = task
            .execute(json!({"bucket": "in", "key": "a.csv"}), &ctx())
            .await
            .unwrap();

        assert_eq!(
            out,
            json!({"data": [{"name": "ana"}], "source": {"bucket": "in", "key": "a.csv"}})
        );
    }

    #[tokio::test]
    async fn test_extract_uses_default_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let task = task_with(&dir, "source", "b.csv", "id\n1\n2\n").await;

        let out = task.execute(json!({"key": "b.csv"}), &ctx()).await.unwrap();
        assert_eq!(out["data"].as_array().unwrap().len(), 2);
        assert_eq!(out["source"]["bucket"], "source");
    }

    #[tokio::test]
    async fn test_extract_failures() {
        let dir = tempfile::tempdir().unwrap();
        let task = task_with(&dir, "in", "bad.csv", "a,b\n1\n").await;

        let err = task.execute(json!({"bucket": "in"}), &ctx()).await.unwrap_err();
        assert_eq!(err.error_class(), "invalid_payload");

        let err = task
            .execute(json!({"bucket": "in", "key": "missing.csv"}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_class(), "object_not_found");

        let err = task
            .execute(json!({"bucket": "in", "key": "bad.csv"}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_class(), "malformed_record");
    }
}
