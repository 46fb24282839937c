//! Definition validation.
//!
//! Validation is the compile step of a pipeline: every transition target must
//! exist before a run may start, so the executor never discovers a dangling
//! reference mid-execution.

use std::fmt;

use thiserror::Error;

use super::document::{PipelineDocument, API_VERSION, KIND};
use super::types::{Transition, WorkflowDefinition};
use crate::error::{PipelineError, PipelineResult};

/// A single structural problem found in a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("Unsupported API version: {0}. Expected pipeflow.io/v1")]
    UnsupportedApiVersion(String),

    #[error("Invalid kind: {0}. Expected Pipeline")]
    InvalidKind(String),

    #[error("Pipeline name must not be empty")]
    EmptyName,

    #[error("Pipeline must declare at least one state")]
    NoStates,

    #[error("State name must not be empty")]
    EmptyStateName,

    #[error("Duplicate state name: {0}")]
    DuplicateState(String),

    #[error("Start state '{0}' is not defined")]
    UnknownStartState(String),

    #[error("State '{state}' declares both 'next' and 'end'")]
    AmbiguousTransition { state: String },

    #[error("State '{state}' declares neither 'next' nor 'end: true'")]
    MissingTransition { state: String },

    #[error("State '{state}' references unknown state '{target}' in {field}")]
    DanglingTarget {
        state: String,
        field: String,
        target: String,
    },

    #[error("State '{state}' has an empty task reference")]
    EmptyTaskRef { state: String },

    #[error("State '{state}': catch[{index}] has an empty errorEquals list")]
    EmptyErrorMatch { state: String, index: usize },

    #[error("State '{state}': timeoutSeconds must be greater than zero")]
    ZeroTimeout { state: String },
}

/// Outcome of validating a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create a report from a list of issues.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Returns true if no issues were found.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// All issues, in discovery order.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Record an issue.
    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Record several issues.
    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    /// Convert into a result, failing if any issue was found.
    pub fn into_result(self) -> PipelineResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return write!(f, "no issues");
        }
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

impl WorkflowDefinition {
    /// Check that the start state and every transition target exist.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.name().trim().is_empty() {
            report.push(ValidationIssue::EmptyName);
        }

        if self.is_empty() {
            report.push(ValidationIssue::NoStates);
        }

        if !self.contains(self.start_state()) {
            report.push(ValidationIssue::UnknownStartState(
                self.start_state().to_string(),
            ));
        }

        // Sorted for stable reports
        let mut states: Vec<_> = self.states().collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));

        for state in states {
            report.extend(state.local_issues());

            if let Transition::Next(target) = &state.transition {
                if !self.contains(target) {
                    report.push(ValidationIssue::DanglingTarget {
                        state: state.name.clone(),
                        field: "next".to_string(),
                        target: target.clone(),
                    });
                }
            }

            for (idx, rule) in state.catch_rules.iter().enumerate() {
                if !self.contains(&rule.target) {
                    report.push(ValidationIssue::DanglingTarget {
                        state: state.name.clone(),
                        field: format!("catch[{}].next", idx),
                        target: rule.target.clone(),
                    });
                }
            }
        }

        report
    }
}

/// Document-level checks that cannot be expressed on the in-memory graph.
pub fn validate_document(doc: &PipelineDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    if doc.api_version != API_VERSION {
        report.push(ValidationIssue::UnsupportedApiVersion(
            doc.api_version.clone(),
        ));
    }

    if doc.kind != KIND {
        report.push(ValidationIssue::InvalidKind(doc.kind.clone()));
    }

    for (name, state) in &doc.states {
        match (&state.next, state.end) {
            (Some(_), true) => report.push(ValidationIssue::AmbiguousTransition {
                state: name.clone(),
            }),
            (None, false) => report.push(ValidationIssue::MissingTransition {
                state: name.clone(),
            }),
            _ => {}
        }
    }

    report
}
