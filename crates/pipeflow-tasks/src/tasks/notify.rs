//! `notify_success` and `notify_failure`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pipeflow_core::InvocationContext;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::TaskError;
use crate::notify::{Notification, NotificationKind, Notifier};
use crate::registry::Task;
use crate::template::TemplateEngine;

/// Renders a message from the payload and publishes it.
pub struct NotifyTask {
    kind: NotificationKind,
    topic: String,
    template: String,
    engine: Arc<TemplateEngine>,
    notifier: Arc<dyn Notifier>,
}

impl NotifyTask {
    pub fn new(
        kind: NotificationKind,
        topic: impl Into<String>,
        template: impl Into<String>,
        engine: Arc<TemplateEngine>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            kind,
            topic: topic.into(),
            template: template.into(),
            engine,
            notifier,
        }
    }

    fn sent_message(&self) -> &'static str {
        match self.kind {
            NotificationKind::Success => "Success notification sent",
            NotificationKind::Failure => "Failure notification sent",
        }
    }
}

#[async_trait]
impl Task for NotifyTask {
    fn name(&self) -> &'static str {
        match self.kind {
            NotificationKind::Success => "notify_success",
            NotificationKind::Failure => "notify_failure",
        }
    }

    async fn execute(&self, payload: Value, ctx: &InvocationContext) -> Result<Value, TaskError> {
        let message = self.engine.render_for(&self.template, ctx, &payload)?;
        debug!(execution_id = %ctx.execution_id, kind = ?self.kind, "Rendered notification");

        let notification = Notification {
            topic: self.topic.clone(),
            kind: self.kind,
            subject: self.kind.subject().to_string(),
            message,
            pipeline: ctx.pipeline.clone(),
            execution_id: ctx.execution_id,
            sent_at: Utc::now(),
        };
        self.notifier.publish(&notification).await?;

        Ok(json!({"message": self.sent_message()}))
    }
}
