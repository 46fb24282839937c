//! Notification message templates using minijinja.

use minijinja::{Environment, Value};
use pipeflow_core::InvocationContext;
use serde_json::json;

use crate::error::TaskError;

/// Template engine with Jinja2-compatible syntax.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("tojson", filter_tojson);
        env.add_filter("upper", filter_upper);
        Self { env }
    }

    /// Render a template string against a JSON context.
    pub fn render(&self, template: &str, context: &serde_json::Value) -> Result<String, TaskError> {
        Ok(self.env.render_str(template, Value::from_serialize(context))?)
    }

    /// Render a notification for one invocation.
    ///
    /// The template sees `pipeline`, `execution_id`, `state` and `payload`.
    pub fn render_for(
        &self,
        template: &str,
        ctx: &InvocationContext,
        payload: &serde_json::Value,
    ) -> Result<String, TaskError> {
        self.render(template, &template_context(ctx, payload))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

fn template_context(ctx: &InvocationContext, payload: &serde_json::Value) -> serde_json::Value {
    json!({
        "pipeline": ctx.pipeline,
        "execution_id": ctx.execution_id.to_string(),
        "state": ctx.state,
        "payload": payload,
    })
}

fn filter_tojson(value: Value) -> Result<String, minijinja::Error> {
    Ok(serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()))
}

fn filter_upper(value: Value) -> String {
    value.to_string().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FAILURE_TEMPLATE, DEFAULT_SUCCESS_TEMPLATE};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Uuid::nil(), "csv_etl", "notify_failure", CancellationToken::new())
    }

    #[test]
    fn test_render_simple() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("Hello {{ name | upper }}", &json!({"name": "ana"}))
            .unwrap();
        assert_eq!(out, "Hello ANA");
    }

    #[test]
    fn test_render_tojson() {
        let engine = TemplateEngine::new();
        let out = engine
            .render("{{ payload | tojson }}", &json!({"payload": {"n": 1}}))
            .unwrap();
        assert_eq!(out, r#"{"n":1}"#);
    }

    #[test]
    fn test_default_failure_template() {
        let engine = TemplateEngine::new();
        let payload = json!({
            "error": "malformed_record",
            "cause": "line 2 has 1 fields, expected 2",
            "failed_state": "extract",
        });

        let out = engine
            .render_for(DEFAULT_FAILURE_TEMPLATE, &ctx(), &payload)
            .unwrap();
        assert_eq!(
            out,
            format!(
                "Pipeline csv_etl run {} failed at state extract (malformed_record): line 2 has 1 fields, expected 2",
                Uuid::nil()
            )
        );
    }

    #[test]
    fn test_default_success_template() {
        let engine = TemplateEngine::new();
        let payload = json!({"message": "written", "bucket": "output", "key": "processed/a.csv", "records": 1});

        let out = engine
            .render_for(DEFAULT_SUCCESS_TEMPLATE, &ctx(), &payload)
            .unwrap();
        assert!(out.ends_with("succeeded: 1 record(s) written to output/processed/a.csv"));

        let out = engine
            .render_for(DEFAULT_SUCCESS_TEMPLATE, &ctx(), &json!({}))
            .unwrap();
        assert!(out.ends_with("succeeded"));
    }

    #[test]
    fn test_syntax_error() {
        let engine = TemplateEngine::new();
        let err = engine.render("{{ unclosed", &json!({})).unwrap_err();
        assert_eq!(err.error_class(), "notification_failed");
    }
}
