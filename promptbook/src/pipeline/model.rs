//! The compiled pipeline document.

use super::{ParameterJson, TemplateJson};
use crate::errors::{PipelineLogicError, PromptbookError};
use crate::execution::Usage;
use serde::{Deserialize, Serialize};

/// Version of the pipeline format this crate writes.
pub const PROMPTBOOK_VERSION: &str = "0.1.0";

/// A source of knowledge referenced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSource {
    /// Name of the source.
    pub name: String,
    /// Inline text, or a reference (URL, file) resolved during preparation.
    pub source_content: String,
}

/// A piece of knowledge produced by preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePiece {
    /// Name of the piece.
    pub name: String,
    /// The text.
    pub content: String,
    /// Names of the knowledge sources the piece came from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// Record of one preparation pass over the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationRecord {
    /// Identifier of the preparation.
    pub id: String,
    /// Version of the engine that prepared the pipeline.
    pub promptbook_version: String,
    /// What the preparation cost.
    #[serde(default)]
    pub usage: Usage,
}

/// A compiled pipeline: parameters and the templates that connect them.
///
/// Once validated a pipeline is treated as an immutable value; execution only
/// ever produces new parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJson {
    /// Unique URL of the pipeline. Anonymous pipelines have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    /// Semantic version of the pipeline format.
    pub promptbook_version: String,
    /// Title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared parameters.
    pub parameters: Vec<ParameterJson>,
    /// Steps of the pipeline.
    pub templates: Vec<TemplateJson>,
    /// Knowledge referenced by the pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_sources: Vec<KnowledgeSource>,
    /// Knowledge resolved by preparation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_pieces: Vec<KnowledgePiece>,
    /// Preparation passes applied to the pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preparations: Vec<PreparationRecord>,
    /// File the pipeline was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl PipelineJson {
    /// Creates an empty anonymous pipeline.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            pipeline_url: None,
            promptbook_version: PROMPTBOOK_VERSION.to_string(),
            title: title.into(),
            description: None,
            parameters: Vec::new(),
            templates: Vec::new(),
            knowledge_sources: Vec::new(),
            knowledge_pieces: Vec::new(),
            preparations: Vec::new(),
            source_file: None,
        }
    }

    /// Sets the pipeline URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.pipeline_url = Some(url.into());
        self
    }

    /// Sets the format version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.promptbook_version = version.into();
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterJson) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds a template.
    #[must_use]
    pub fn with_template(mut self, template: TemplateJson) -> Self {
        self.templates.push(template);
        self
    }

    /// Adds a knowledge source.
    #[must_use]
    pub fn with_knowledge_source(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.knowledge_sources.push(KnowledgeSource {
            name: name.into(),
            source_content: content.into(),
        });
        self
    }

    /// Sets the source file.
    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    /// Looks up a declared parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterJson> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Iterates over input parameters.
    pub fn input_parameters(&self) -> impl Iterator<Item = &ParameterJson> {
        self.parameters.iter().filter(|p| p.is_input)
    }

    /// Iterates over output parameters.
    pub fn output_parameters(&self) -> impl Iterator<Item = &ParameterJson> {
        self.parameters.iter().filter(|p| p.is_output)
    }

    /// Returns the URL or a placeholder for anonymous pipelines.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.pipeline_url.as_deref().unwrap_or(&self.title)
    }
}

/// Parses a pipeline from its JSON text.
///
/// Shape errors (e.g. `parameters` not being an array) are reported as
/// [`PipelineLogicError`]s so authors see them like any other validation failure.
pub fn pipeline_from_json_str(text: &str) -> Result<PipelineJson, PromptbookError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    pipeline_from_json_value(value)
}

/// Parses a pipeline from a JSON value.
pub fn pipeline_from_json_value(value: serde_json::Value) -> Result<PipelineJson, PromptbookError> {
    for field in ["parameters", "templates"] {
        match value.get(field) {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => {
                return Err(PipelineLogicError::new(format!("Pipeline is invalid: `{field}` is not an array")).into());
            }
            None => {
                return Err(PipelineLogicError::new(format!("Pipeline is invalid: `{field}` is missing")).into());
            }
        }
    }

    serde_json::from_value(value)
        .map_err(|e| PipelineLogicError::new(format!("Pipeline is invalid: {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TemplateJson;

    #[test]
    fn test_pipeline_builder_lookups() {
        let pipeline = PipelineJson::new("Example")
            .with_parameter(ParameterJson::input("thing"))
            .with_parameter(ParameterJson::output("response"))
            .with_template(TemplateJson::simple("response", "{thing}").with_dependency("thing"));

        assert_eq!(pipeline.input_parameters().count(), 1);
        assert_eq!(pipeline.output_parameters().count(), 1);
        assert!(pipeline.parameter("thing").is_some());
        assert!(pipeline.parameter("nope").is_none());
        assert_eq!(pipeline.display_name(), "Example");
    }

    #[test]
    fn test_parse_rejects_non_array_parameters() {
        let err = pipeline_from_json_str(
            r#"{"promptbookVersion":"0.1.0","title":"x","parameters":{},"templates":[]}"#,
        )
        .unwrap_err();

        assert_eq!(err.name(), "PipelineLogicError");
        assert!(err.to_string().contains("`parameters` is not an array"));
    }

    #[test]
    fn test_parse_minimal_pipeline() {
        let pipeline = pipeline_from_json_str(
            r#"{
                "pipelineUrl": "https://example.com/hello.book.md",
                "promptbookVersion": "0.1.0",
                "title": "Hello",
                "parameters": [{"name": "thing", "isInput": true}],
                "templates": []
            }"#,
        )
        .unwrap();

        assert_eq!(pipeline.pipeline_url.as_deref(), Some("https://example.com/hello.book.md"));
        assert!(pipeline.parameters[0].is_input);
        assert!(!pipeline.parameters[0].is_output);
    }

    #[test]
    fn test_preparation_usage_defaults_to_zero() {
        let pipeline = pipeline_from_json_str(
            r#"{
                "promptbookVersion": "0.1.0",
                "title": "Prepared",
                "parameters": [],
                "templates": [],
                "preparations": [{"id": "p1", "promptbookVersion": "0.1.0"}]
            }"#,
        )
        .unwrap();

        assert_eq!(pipeline.preparations.len(), 1);
        assert!(pipeline.preparations[0].usage.is_zero());
    }
}
