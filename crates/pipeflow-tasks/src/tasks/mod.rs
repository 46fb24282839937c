//! Built-in pipeline stages.

mod extract;
mod load;
mod notify;
mod transform;

pub use extract::ExtractTask;
pub use load::LoadTask;
pub use notify::NotifyTask;
pub use transform::TransformTask;

use std::sync::Arc;

use tracing::info;

use crate::config::TasksConfig;
use crate::error::TaskError;
use crate::notify::{LogNotifier, NotificationKind, Notifier, WebhookNotifier};
use crate::registry::TaskRegistry;
use crate::storage::{LocalObjectStore, ObjectStore};
use crate::template::TemplateEngine;

/// Build a registry with every built-in stage wired to `store` and `notifier`.
pub fn create_registry(
    config: &TasksConfig,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
) -> TaskRegistry {
    let engine = Arc::new(TemplateEngine::new());
    let mut registry = TaskRegistry::new();

    registry.register(ExtractTask::new(store.clone(), &config.source_bucket));
    registry.register(TransformTask);
    registry.register(LoadTask::new(
        store,
        &config.output_bucket,
        &config.output_prefix,
    ));
    registry.register(NotifyTask::new(
        NotificationKind::Success,
        &config.notify_topic,
        &config.success_template,
        engine.clone(),
        notifier.clone(),
    ));
    registry.register(NotifyTask::new(
        NotificationKind::Failure,
        &config.notify_topic,
        &config.failure_template,
        engine,
        notifier,
    ));

    registry
}

/// Build the default registry: local object store, and a webhook notifier
/// when a URL is configured (log notifier otherwise).
pub fn create_default_registry(config: &TasksConfig) -> Result<TaskRegistry, TaskError> {
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(&config.storage_root));
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url, config.notify_timeout)?),
        None => Arc::new(LogNotifier),
    };

    info!(
        storage_root = %config.storage_root.display(),
        webhook = config.notify_webhook_url.is_some(),
        "Task registry initialised"
    );

    Ok(create_registry(config, store, notifier))
}
