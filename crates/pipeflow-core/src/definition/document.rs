//! Pipeline definition document (serialized form).
//!
//! The document is what users write in YAML or JSON:
//! - `startAt` names the first state
//! - `states` maps state names to a task reference and its transitions
//! - `next` / `end` declare the success transition
//! - `catch[]` routes task failures to another state
//!
//! Documents are turned into a validated
//! [`WorkflowDefinition`](super::WorkflowDefinition) by the parser; nothing
//! executes a document directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supported document API version.
pub const API_VERSION: &str = "pipeflow.io/v1";

/// Supported document kind.
pub const KIND: &str = "Pipeline";

/// Pipeline metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    /// Pipeline name (required).
    pub name: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Catch clause attached to a state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CatchDocument {
    /// Error classes this clause accepts (`States.ALL` accepts every class).
    pub error_equals: Vec<String>,

    /// State to route to when the clause matches.
    pub next: String,
}

/// A single state as written in the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StateDocument {
    /// Task reference handed to the task invoker.
    pub task: String,

    /// Free-form comment, ignored by execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Successor on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// Marks the state terminal on success.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub end: bool,

    /// Ordered failure routing rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catch: Vec<CatchDocument>,

    /// Step timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Complete pipeline document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    /// API version (pipeflow.io/v1).
    pub api_version: String,

    /// Resource kind (Pipeline).
    pub kind: String,

    /// Metadata (name, description).
    pub metadata: Metadata,

    /// Name of the first state.
    pub start_at: String,

    /// States keyed by name.
    #[serde(default)]
    pub states: BTreeMap<String, StateDocument>,
}

impl PipelineDocument {
    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Get all state names.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let yaml = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: two_step
startAt: first
states:
  first:
    task: extract
    next: second
    catch:
      - errorEquals: ["States.ALL"]
        next: second
  second:
    task: notify_success
    end: true
"#;

        let doc: PipelineDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.api_version, API_VERSION);
        assert_eq!(doc.kind, KIND);
        assert_eq!(doc.name(), "two_step");
        assert_eq!(doc.start_at, "first");
        assert_eq!(doc.state_names(), vec!["first", "second"]);

        let first = &doc.states["first"];
        assert_eq!(first.next.as_deref(), Some("second"));
        assert!(!first.end);
        assert_eq!(first.catch[0].error_equals, vec!["States.ALL"]);

        let second = &doc.states["second"];
        assert!(second.end);
        assert!(second.catch.is_empty());
    }

    #[test]
    fn test_reject_unknown_state_fields() {
        let yaml = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: choice
startAt: first
states:
  first:
    task: extract
    type: Choice
    end: true
"#;

        let result: Result<PipelineDocument, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_skips_defaults() {
        let state = StateDocument {
            task: "load".to_string(),
            comment: None,
            next: None,
            end: true,
            catch: vec![],
            timeout_seconds: None,
        };

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"task":"load","end":true}"#);
    }
}
