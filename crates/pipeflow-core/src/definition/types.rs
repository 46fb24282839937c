//! In-memory pipeline graph.
//!
//! A [`WorkflowDefinition`] is built once, validated at construction and never
//! mutated afterwards, so it can be shared across concurrent runs behind an
//! `Arc`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::document::{CatchDocument, Metadata, PipelineDocument, StateDocument, API_VERSION, KIND};
use super::validate::ValidationIssue;
use crate::error::{PipelineError, PipelineResult};
use crate::invoker::error_class;

/// Success transition of a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Continue with the named state.
    Next(String),
    /// Terminal on success.
    End,
}

/// Error classes accepted by a catch rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMatch {
    /// Accepts every error class.
    All,
    /// Accepts the listed error classes exactly.
    Classes(Vec<String>),
}

impl ErrorMatch {
    /// Build a matcher from `errorEquals` patterns.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if classes
            .iter()
            .any(|c| c == error_class::ALL || c == error_class::WILDCARD)
        {
            ErrorMatch::All
        } else {
            ErrorMatch::Classes(classes)
        }
    }

    /// Check whether an error class is accepted.
    pub fn matches(&self, class: &str) -> bool {
        match self {
            ErrorMatch::All => true,
            ErrorMatch::Classes(classes) => classes.iter().any(|c| c == class),
        }
    }

    /// Patterns in document form.
    pub fn patterns(&self) -> Vec<String> {
        match self {
            ErrorMatch::All => vec![error_class::ALL.to_string()],
            ErrorMatch::Classes(classes) => classes.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, ErrorMatch::Classes(classes) if classes.is_empty())
    }
}

/// Failure routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchRule {
    pub error_match: ErrorMatch,
    pub target: String,
}

impl CatchRule {
    /// Catch-all rule routing to `target`.
    pub fn all(target: impl Into<String>) -> Self {
        Self {
            error_match: ErrorMatch::All,
            target: target.into(),
        }
    }
}

/// A named state referencing one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    /// Unique state name.
    pub name: String,

    /// Opaque task reference resolved by the task invoker.
    pub task_ref: String,

    /// Success transition.
    pub transition: Transition,

    /// Ordered failure routing rules, first match wins.
    #[serde(default)]
    pub catch_rules: Vec<CatchRule>,

    /// Step timeout overriding the executor default.
    #[serde(default)]
    pub timeout: Option<Duration>,

    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl StateSpec {
    /// Create a terminal state running `task_ref`.
    pub fn task(name: impl Into<String>, task_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_ref: task_ref.into(),
            transition: Transition::End,
            catch_rules: Vec::new(),
            timeout: None,
            comment: None,
        }
    }

    /// Set the success successor.
    pub fn next(mut self, state: impl Into<String>) -> Self {
        self.transition = Transition::Next(state.into());
        self
    }

    /// Append a catch rule.
    pub fn catch(mut self, error_match: ErrorMatch, target: impl Into<String>) -> Self {
        self.catch_rules.push(CatchRule {
            error_match,
            target: target.into(),
        });
        self
    }

    /// Append a catch-all rule.
    pub fn catch_all(self, target: impl Into<String>) -> Self {
        self.catch(ErrorMatch::All, target)
    }

    /// Set the step timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Successor on success, if any.
    pub fn on_success(&self) -> Option<&str> {
        match &self.transition {
            Transition::Next(name) => Some(name),
            Transition::End => None,
        }
    }

    /// Returns true if the state ends the run on success.
    pub fn is_terminal(&self) -> bool {
        matches!(self.transition, Transition::End)
    }

    /// First catch rule accepting `class`, in declared order.
    pub fn find_catch(&self, class: &str) -> Option<&CatchRule> {
        self.catch_rules.iter().find(|r| r.error_match.matches(class))
    }

    fn from_document(name: &str, doc: &StateDocument) -> Self {
        let transition = match &doc.next {
            Some(next) => Transition::Next(next.clone()),
            None => Transition::End,
        };
        let catch_rules = doc
            .catch
            .iter()
            .map(|c| CatchRule {
                error_match: ErrorMatch::from_patterns(c.error_equals.iter().cloned()),
                target: c.next.clone(),
            })
            .collect();

        Self {
            name: name.to_string(),
            task_ref: doc.task.clone(),
            transition,
            catch_rules,
            timeout: doc.timeout_seconds.map(Duration::from_secs),
            comment: doc.comment.clone(),
        }
    }

    fn to_document(&self) -> StateDocument {
        StateDocument {
            task: self.task_ref.clone(),
            comment: self.comment.clone(),
            next: self.on_success().map(str::to_string),
            end: self.is_terminal(),
            catch: self
                .catch_rules
                .iter()
                .map(|r| CatchDocument {
                    error_equals: r.error_match.patterns(),
                    next: r.target.clone(),
                })
                .collect(),
            timeout_seconds: self.timeout.map(|t| t.as_secs()),
        }
    }

    /// Structural issues local to this state.
    pub(super) fn local_issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::EmptyStateName);
        }
        if self.task_ref.trim().is_empty() {
            issues.push(ValidationIssue::EmptyTaskRef {
                state: self.name.clone(),
            });
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            issues.push(ValidationIssue::ZeroTimeout {
                state: self.name.clone(),
            });
        }
        for (index, rule) in self.catch_rules.iter().enumerate() {
            if rule.error_match.is_empty() {
                issues.push(ValidationIssue::EmptyErrorMatch {
                    state: self.name.clone(),
                    index,
                });
            }
        }

        issues
    }
}

/// Validated, immutable pipeline graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    name: String,
    description: Option<String>,
    start_state: String,
    states: HashMap<String, StateSpec>,
}

impl WorkflowDefinition {
    /// Build and validate a definition.
    ///
    /// Fails closed: an invalid graph is never returned.
    pub fn new(
        name: impl Into<String>,
        start_state: impl Into<String>,
        states: Vec<StateSpec>,
    ) -> PipelineResult<Self> {
        let mut issues = Vec::new();
        let mut map = HashMap::with_capacity(states.len());
        for state in states {
            if map.contains_key(&state.name) {
                issues.push(ValidationIssue::DuplicateState(state.name.clone()));
                continue;
            }
            map.insert(state.name.clone(), state);
        }

        let definition = Self {
            name: name.into(),
            description: None,
            start_state: start_state.into(),
            states: map,
        };

        let mut report = definition.validate();
        report.extend(issues);
        report.into_result()?;

        tracing::debug!(
            pipeline = %definition.name,
            start = %definition.start_state,
            state_count = definition.states.len(),
            "Pipeline definition validated"
        );

        Ok(definition)
    }

    /// Build a definition from a parsed document.
    pub fn from_document(doc: &PipelineDocument) -> PipelineResult<Self> {
        super::validate::validate_document(doc).into_result()?;

        let states = doc
            .states
            .iter()
            .map(|(name, state)| StateSpec::from_document(name, state))
            .collect();

        let mut definition = Self::new(doc.metadata.name.clone(), doc.start_at.clone(), states)?;
        definition.description = doc.metadata.description.clone();
        Ok(definition)
    }

    /// Convert back into document form.
    pub fn to_document(&self) -> PipelineDocument {
        PipelineDocument {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata {
                name: self.name.clone(),
                description: self.description.clone(),
            },
            start_at: self.start_state.clone(),
            states: self
                .states
                .iter()
                .map(|(name, state)| (name.clone(), state.to_document()))
                .collect(),
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolve a state by name.
    pub fn resolve(&self, state_name: &str) -> PipelineResult<&StateSpec> {
        self.states
            .get(state_name)
            .ok_or_else(|| PipelineError::UnknownState(state_name.to_string()))
    }

    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the start state name.
    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    /// Iterate over all states.
    pub fn states(&self) -> impl Iterator<Item = &StateSpec> {
        self.states.values()
    }

    /// Get all state names, sorted.
    pub fn state_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the definition has no states (never true once validated).
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub(super) fn contains(&self, state_name: &str) -> bool {
        self.states.contains_key(state_name)
    }
}
