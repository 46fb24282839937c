//! Notification delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::TaskError;

/// Which terminal branch produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failure,
}

impl NotificationKind {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Success => "Pipeline succeeded",
            Self::Failure => "Pipeline failed",
        }
    }
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    pub pipeline: String,
    pub execution_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

/// Publishes notifications to an external channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), TaskError>;
}

/// Notifier that writes to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, notification: &Notification) -> Result<(), TaskError> {
        match notification.kind {
            NotificationKind::Success => info!(
                topic = %notification.topic,
                execution_id = %notification.execution_id,
                subject = %notification.subject,
                "{}",
                notification.message
            ),
            NotificationKind::Failure => warn!(
                topic = %notification.topic,
                execution_id = %notification.execution_id,
                subject = %notification.subject,
                "{}",
                notification.message
            ),
        }
        Ok(())
    }
}

/// Notifier that POSTs the notification as JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TaskError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TaskError::Configuration(format!(
                "webhook URL must be http(s): {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaskError::Configuration(e.to_string()))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, notification: &Notification) -> Result<(), TaskError> {
        debug!(url = %self.url, topic = %notification.topic, "Posting notification");

        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::Notification(format!(
                "webhook returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
