//! Pipeline definitions.
//!
//! This module provides the static side of the orchestrator:
//! - Document types for YAML/JSON definitions
//! - The validated in-memory graph
//! - Parsing and validation
//! - The built-in CSV ETL pipeline

pub mod canonical;
pub mod document;
pub mod parser;
pub mod types;
pub mod validate;

pub use canonical::CSV_ETL_YAML;
pub use document::{CatchDocument, Metadata, PipelineDocument, StateDocument, API_VERSION, KIND};
pub use parser::{load_definition, parse_definition, parse_document};
pub use types::{CatchRule, ErrorMatch, StateSpec, Transition, WorkflowDefinition};
pub use validate::{validate_document, ValidationIssue, ValidationReport};
