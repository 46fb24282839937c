//! Task configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_SUCCESS_TEMPLATE: &str = "Pipeline {{ pipeline }} run {{ execution_id }} succeeded\
{% if payload.records is defined %}: {{ payload.records }} record(s) written to \
{{ payload.bucket }}/{{ payload.key }}{% endif %}";

pub const DEFAULT_FAILURE_TEMPLATE: &str = "Pipeline {{ pipeline }} run {{ execution_id }} failed \
at state {{ payload.failed_state }} ({{ payload.error }})\
{% if payload.cause %}: {{ payload.cause }}{% endif %}";

/// Configuration injected into the built-in tasks.
#[derive(Debug, Clone)]
pub struct TasksConfig {
    /// Directory backing the local object store.
    pub storage_root: PathBuf,

    /// Bucket read by `extract` when the payload names none.
    pub source_bucket: String,

    /// Bucket written by `load`.
    pub output_bucket: String,

    /// Key prefix for objects written by `load`.
    pub output_prefix: String,

    /// Topic attached to every notification.
    pub notify_topic: String,

    /// Webhook receiving notifications; logged only when unset.
    pub notify_webhook_url: Option<String>,

    /// Webhook request timeout.
    pub notify_timeout: Duration,

    /// Message template for `notify_success`.
    pub success_template: String,

    /// Message template for `notify_failure`.
    pub failure_template: String,
}

impl TasksConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let storage_root = std::env::var("PIPEFLOW_STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_root);

        let source_bucket = std::env::var("PIPEFLOW_SOURCE_BUCKET")
            .unwrap_or(defaults.source_bucket);

        let output_bucket = std::env::var("PIPEFLOW_OUTPUT_BUCKET")
            .unwrap_or(defaults.output_bucket);

        let output_prefix = std::env::var("PIPEFLOW_OUTPUT_PREFIX")
            .unwrap_or(defaults.output_prefix);

        let notify_topic = std::env::var("PIPEFLOW_NOTIFY_TOPIC")
            .unwrap_or(defaults.notify_topic);

        let notify_webhook_url = std::env::var("PIPEFLOW_NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let notify_timeout = match std::env::var("PIPEFLOW_NOTIFY_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("PIPEFLOW_NOTIFY_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            Err(_) => defaults.notify_timeout,
        };

        let success_template = std::env::var("PIPEFLOW_NOTIFY_SUCCESS_TEMPLATE")
            .unwrap_or(defaults.success_template);

        let failure_template = std::env::var("PIPEFLOW_NOTIFY_FAILURE_TEMPLATE")
            .unwrap_or(defaults.failure_template);

        Ok(Self {
            storage_root,
            source_bucket,
            output_bucket,
            output_prefix,
            notify_topic,
            notify_webhook_url,
            notify_timeout,
            success_template,
            failure_template,
        })
    }

    /// Point the object store at `root`.
    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = root.into();
        self
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./data"),
            source_bucket: "source".to_string(),
            output_bucket: "output".to_string(),
            output_prefix: "processed/".to_string(),
            notify_topic: "pipeflow-notifications".to_string(),
            notify_webhook_url: None,
            notify_timeout: Duration::from_secs(10),
            success_template: DEFAULT_SUCCESS_TEMPLATE.to_string(),
            failure_template: DEFAULT_FAILURE_TEMPLATE.to_string(),
        }
    }
}
