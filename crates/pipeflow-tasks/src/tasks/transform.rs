//! `transform`: upper-case every string field.

use async_trait::async_trait;
use pipeflow_core::InvocationContext;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::TaskError;
use crate::registry::Task;

/// Maps `{data: [...]}` to the same records with string values upper-cased.
/// `source` is carried through when present.
#[derive(Debug, Clone, Default)]
pub struct TransformTask;

fn transform_record(index: usize, record: &Value) -> Result<Value, TaskError> {
    let fields = record.as_object().ok_or_else(|| {
        TaskError::MalformedRecord(format!("record {} is not an object", index))
    })?;

    let out: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect();
    Ok(Value::Object(out))
}

#[async_trait]
impl Task for TransformTask {
    fn name(&self) -> &'static str {
        "transform"
    }

    async fn execute(&self, payload: Value, ctx: &InvocationContext) -> Result<Value, TaskError> {
        let records = payload
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| TaskError::InvalidPayload("payload has no 'data' array".to_string()))?;

        let data = records
            .iter()
            .enumerate()
            .map(|(i, r)| transform_record(i, r))
            .collect::<Result<Vec<_>, _>>()?;

        info!(execution_id = %ctx.execution_id, records = data.len(), "Transformed records");

        let mut out = Map::new();
        out.insert("data".to_string(), Value::Array(data));
        if let Some(source) = payload.get("source") {
            out.insert("source".to_string(), source.clone());
        }
        Ok(Value::Object(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Uuid::new_v4(), "csv_etl", "transform", CancellationToken::new())
    }

    #[tokio::test]
    async fn test_transform_upper_cases_strings() {
        let out = TransformTask
            .execute(
                json!({"data": [{"name": "ana", "age": 7}], "source": {"key": "a.csv"}}),
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            json!({"data": [{"name": "ANA", "age": 7}], "source": {"key": "a.csv"}})
        );
    }

    #[tokio::test]
    async fn test_transform_without_source() {
        let out = TransformTask
            .execute(json!({"data": [{"name": "ana"}]}), &ctx())
            .await
            .unwrap();
        assert_eq!(out, json!({"data": [{"name": "ANA"}]}));
    }

    #[tokio::test]
    async fn test_transform_rejects_bad_input() {
        let err = TransformTask.execute(json!({}), &ctx()).await.unwrap_err();
        assert_eq!(err.error_class(), "invalid_payload");

        let err = TransformTask
            .execute(json!({"data": [1]}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err.error_class(), "malformed_record");
    }
}
