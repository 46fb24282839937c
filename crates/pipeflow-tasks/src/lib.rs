//! Pipeflow task library.
//!
//! Production collaborators for the CSV ETL pipeline: object storage, CSV
//! handling, notification delivery, and a [`TaskRegistry`] that serves as
//! the executor's [`TaskInvoker`](pipeflow_core::TaskInvoker).

pub mod config;
pub mod csv;
pub mod error;
pub mod notify;
pub mod registry;
pub mod storage;
pub mod tasks;
pub mod template;

pub use config::TasksConfig;
pub use error::TaskError;
pub use notify::{LogNotifier, Notification, NotificationKind, Notifier, WebhookNotifier};
pub use registry::{Task, TaskRegistry};
pub use storage::{LocalObjectStore, ObjectStore};
pub use tasks::{create_default_registry, create_registry};
pub use template::TemplateEngine;
