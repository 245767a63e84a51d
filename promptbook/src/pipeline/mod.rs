//! The pipeline data model.
//!
//! This module provides:
//! - Parameter and template declarations
//! - The compiled pipeline document and its JSON parsing
//! - Reserved parameter names
//! - The canonical (unprepared) form used for identity checks

mod canonical;
mod model;
mod parameter;
mod reserved;
mod template;

pub use canonical::{
    is_pipeline_prepared, is_same_pipeline, pipeline_to_canonical_string, unprepare_pipeline,
};
pub use model::{
    pipeline_from_json_str, pipeline_from_json_value, KnowledgePiece, KnowledgeSource,
    PipelineJson, PreparationRecord, PROMPTBOOK_VERSION,
};
pub use parameter::ParameterJson;
pub use reserved::{
    is_reserved_parameter_name, RESERVED_PARAMETER_MISSING_VALUE, RESERVED_PARAMETER_NAMES,
};
pub use template::{
    BlockType, ExpectFormat, ExpectationAmounts, ExpectationUnit, Expectations,
    ModelRequirements, ModelVariant, TemplateJson,
};

/// Parameter bindings: name to value.
pub type Parameters = std::collections::BTreeMap<String, String>;
