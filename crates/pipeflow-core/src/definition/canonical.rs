//! Built-in CSV ETL pipeline.

use super::parser::parse_definition;
use super::types::WorkflowDefinition;
use crate::error::PipelineResult;

/// Canonical definition source, embedded at build time.
pub const CSV_ETL_YAML: &str = include_str!("../../pipelines/csv_etl.yaml");

/// State names of the canonical pipeline.
pub mod states {
    pub const EXTRACT: &str = "extract";
    pub const TRANSFORM: &str = "transform";
    pub const LOAD: &str = "load";
    pub const NOTIFY_SUCCESS: &str = "notify_success";
    pub const NOTIFY_FAILURE: &str = "notify_failure";
}

impl WorkflowDefinition {
    /// extract -> transform -> load -> notify_success, with a catch-all from
    /// each processing stage to notify_failure.
    pub fn canonical() -> PipelineResult<Self> {
        parse_definition(CSV_ETL_YAML)
    }
}
