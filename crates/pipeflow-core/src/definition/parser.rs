//! Pipeline definition parser.
//!
//! Accepts YAML or JSON (JSON is parsed through the YAML reader) and always
//! returns a validated [`WorkflowDefinition`].

use std::path::Path;

use super::document::PipelineDocument;
use super::types::WorkflowDefinition;
use crate::error::{PipelineError, PipelineResult};

/// Parse a YAML or JSON string into a document without validating it.
pub fn parse_document(content: &str) -> PipelineResult<PipelineDocument> {
    if content.trim().is_empty() {
        return Err(PipelineError::Parse("Definition is empty".to_string()));
    }

    let doc: PipelineDocument = serde_yaml::from_str(content)?;
    Ok(doc)
}

/// Parse and validate a definition.
pub fn parse_definition(content: &str) -> PipelineResult<WorkflowDefinition> {
    let doc = parse_document(content)?;
    WorkflowDefinition::from_document(&doc)
}

/// Load and validate a definition file.
pub fn load_definition(path: impl AsRef<Path>) -> PipelineResult<WorkflowDefinition> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    tracing::debug!(path = %path.display(), "Loading pipeline definition");

    parse_definition(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::ValidationIssue;

    fn issues_of(err: PipelineError) -> Vec<ValidationIssue> {
        match err {
            PipelineError::Validation(report) => report.issues().to_vec(),
            other => panic!("Expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_valid_definition() {
        let yaml = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: test
  description: single state
startAt: only
states:
  only:
    task: extract
    end: true
"#;

        let definition = parse_definition(yaml).unwrap();
        assert_eq!(definition.name(), "test");
        assert_eq!(definition.description(), Some("single state"));
        assert!(definition.resolve("only").unwrap().is_terminal());
    }

    #[test]
    fn test_parse_json_definition() {
        let json = r#"{
  "apiVersion": "pipeflow.io/v1",
  "kind": "Pipeline",
  "metadata": {"name": "json"},
  "startAt": "a",
  "states": {
    "a": {"task": "extract", "next": "b", "catch": [{"errorEquals": ["States.ALL"], "next": "b"}]},
    "b": {"task": "notify_success", "end": true, "timeoutSeconds": 30}
  }
}"#;

        let definition = parse_definition(json).unwrap();
        let b = definition.resolve("b").unwrap();
        assert_eq!(b.timeout, Some(std::time::Duration::from_secs(30)));
        assert_eq!(definition.resolve("a").unwrap().catch_rules.len(), 1);
    }

    #[test]
    fn test_parse_invalid_api_version() {
        let yaml = r#"
apiVersion: pipeflow.io/v0
kind: Pipeline
metadata:
  name: test
startAt: only
states:
  only:
    task: extract
    end: true
"#;

        let err = parse_definition(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported API version"));
    }

    #[test]
    fn test_parse_next_and_end_conflict() {
        let yaml = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: test
startAt: a
states:
  a:
    task: extract
    next: b
    end: true
  b:
    task: load
"#;

        let issues = issues_of(parse_definition(yaml).unwrap_err());
        assert_eq!(
            issues,
            vec![
                ValidationIssue::AmbiguousTransition {
                    state: "a".to_string()
                },
                ValidationIssue::MissingTransition {
                    state: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_dangling_catch_target() {
        let yaml = r#"
apiVersion: pipeflow.io/v1
kind: Pipeline
metadata:
  name: test
startAt: a
states:
  a:
    task: extract
    end: true
    catch:
      - errorEquals: ["States.ALL"]
        next: notify_failure
"#;

        let err = parse_definition(yaml).unwrap_err();
        assert!(err.is_definition_error());
        assert!(err.to_string().contains("unknown state 'notify_failure'"));
    }

    #[test]
    fn test_parse_malformed_yaml() {
        let err = parse_definition("states: [unclosed").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));

        let err = parse_definition("   ").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_definition("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
