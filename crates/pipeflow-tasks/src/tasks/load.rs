//! `load`: write records as CSV to the output bucket.

use std::sync::Arc;

use async_trait::async_trait;
use pipeflow_core::InvocationContext;
use serde_json::{json, Value};
use tracing::info;

use crate::csv::render_records;
use crate::error::TaskError;
use crate::registry::Task;
use crate::storage::ObjectStore;

/// Writes `{data: [...]}` to `<prefix><source key or execution id>.csv`.
pub struct LoadTask {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
}

impl LoadTask {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    fn output_key(&self, payload: &Value, ctx: &InvocationContext) -> String {
        let stem = payload
            .pointer("/source/key")
            .and_then(Value::as_str)
            .map(|key| key.strip_suffix(".csv").unwrap_or(key).to_string())
            .unwrap_or_else(|| ctx.execution_id.to_string());
        format!("{}{}.csv", self.prefix, stem)
    }
}

#[async_trait]
impl Task for LoadTask {
    fn name(&self) -> &'static str {
        "load"
    }

    async fn execute(&self, payload: Value, ctx: &InvocationContext) -> Result<Value, TaskError> {
        let records = payload
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| TaskError::InvalidPayload("payload has no 'data' array".to_string()))?;

        let body = render_records(records)?;
        let key = self.output_key(&payload, ctx);
        self.store.put(&self.bucket, &key, body.into_bytes()).await?;

        info!(
            execution_id = %ctx.execution_id,
            bucket = %self.bucket,
            key = %key,
            records = records.len(),
            "Loaded records"
        );

        Ok(json!({
            "message": "written",
            "bucket": self.bucket,
            "key": key,
            "records": records.len(),
        }))
    }
}
