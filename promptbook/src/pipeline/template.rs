//! Pipeline templates (the steps of a pipeline).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of work a template describes.
///
/// Each block type is executed by the tool registered for it in
/// [`ExecutionTools`](crate::execution::ExecutionTools).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// A prompt sent to a language model.
    Prompt,
    /// Plain parameter substitution, no external call.
    Simple,
    /// A script evaluated by a script runtime.
    Script,
    /// A question answered by the user.
    Dialog,
}

impl BlockType {
    /// Returns the block type as written in pipeline files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prompt => "PROMPT",
            Self::Simple => "SIMPLE",
            Self::Script => "SCRIPT",
            Self::Dialog => "DIALOG",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit in which an expectation is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationUnit {
    /// Unicode characters.
    Characters,
    /// Words.
    Words,
    /// Sentences.
    Sentences,
    /// Standard lines.
    Lines,
    /// Paragraphs.
    Paragraphs,
    /// Standard pages.
    Pages,
}

impl ExpectationUnit {
    /// All units in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Characters,
        Self::Words,
        Self::Sentences,
        Self::Lines,
        Self::Paragraphs,
        Self::Pages,
    ];

    /// Returns the lowercase unit name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Characters => "characters",
            Self::Words => "words",
            Self::Sentences => "sentences",
            Self::Lines => "lines",
            Self::Paragraphs => "paragraphs",
            Self::Pages => "pages",
        }
    }
}

impl std::fmt::Display for ExpectationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds on the amount of some unit in a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpectationAmounts {
    /// Inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    /// Inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl ExpectationAmounts {
    /// Creates bounds from optional min and max.
    #[must_use]
    pub fn new(min: Option<u64>, max: Option<u64>) -> Self {
        Self { min, max }
    }
}

/// Expectations keyed by unit.
pub type Expectations = BTreeMap<ExpectationUnit, ExpectationAmounts>;

/// Required format of a template result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectFormat {
    /// The result must be a valid JSON document.
    Json,
}

/// Model variant a prompt is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelVariant {
    /// Chat model.
    Chat,
    /// Completion model.
    Completion,
    /// Embedding model.
    Embedding,
}

/// Requirements a model must meet to execute a prompt template.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRequirements {
    /// Chat, completion or embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_variant: Option<ModelVariant>,
    /// Specific model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// System message for chat models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Sampling seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Upper bound on generated tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
}

impl ModelRequirements {
    /// Creates requirements for a model variant.
    #[must_use]
    pub fn variant(model_variant: ModelVariant) -> Self {
        Self {
            model_variant: Some(model_variant),
            ..Self::default()
        }
    }
}

/// One step of a pipeline. Consumes some parameters, produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateJson {
    /// Machine name of the template.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What kind of work the template does.
    pub block_type: BlockType,
    /// The template body with `{parameter}` placeholders.
    pub content: String,
    /// The parameter this template produces.
    pub resulting_parameter_name: String,
    /// The parameters this template consumes.
    #[serde(default)]
    pub dependent_parameter_names: Vec<String>,
    /// Dependencies that may satisfy the template without running it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joker_parameter_names: Vec<String>,
    /// Constraints the result must meet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectations: Option<Expectations>,
    /// Required result format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ExpectFormat>,
    /// Model requirements for prompt templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_requirements: Option<ModelRequirements>,
    /// Script language for script templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
}

impl TemplateJson {
    /// Creates a template producing `resulting_parameter_name` from `content`.
    #[must_use]
    pub fn new(
        block_type: BlockType,
        resulting_parameter_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let resulting_parameter_name = resulting_parameter_name.into();
        Self {
            name: resulting_parameter_name.clone(),
            title: resulting_parameter_name.clone(),
            description: None,
            block_type,
            content: content.into(),
            resulting_parameter_name,
            dependent_parameter_names: Vec::new(),
            joker_parameter_names: Vec::new(),
            expectations: None,
            format: None,
            model_requirements: None,
            content_language: None,
        }
    }

    /// Creates a prompt template for a chat model.
    #[must_use]
    pub fn prompt(resulting_parameter_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(BlockType::Prompt, resulting_parameter_name, content)
            .with_model_requirements(ModelRequirements::variant(ModelVariant::Chat))
    }

    /// Creates a simple substitution template.
    #[must_use]
    pub fn simple(resulting_parameter_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(BlockType::Simple, resulting_parameter_name, content)
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependent_parameter_names = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependent_parameter_names.push(dep.into());
        self
    }

    /// Adds a joker parameter.
    #[must_use]
    pub fn with_joker(mut self, joker: impl Into<String>) -> Self {
        self.joker_parameter_names.push(joker.into());
        self
    }

    /// Adds an expectation.
    #[must_use]
    pub fn with_expectation(mut self, unit: ExpectationUnit, min: Option<u64>, max: Option<u64>) -> Self {
        self.expectations
            .get_or_insert_with(Expectations::new)
            .insert(unit, ExpectationAmounts::new(min, max));
        self
    }

    /// Sets the required format.
    #[must_use]
    pub fn with_format(mut self, format: ExpectFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Sets the model requirements.
    #[must_use]
    pub fn with_model_requirements(mut self, requirements: ModelRequirements) -> Self {
        self.model_requirements = Some(requirements);
        self
    }

    /// Sets the script language.
    #[must_use]
    pub fn with_content_language(mut self, language: impl Into<String>) -> Self {
        self.content_language = Some(language.into());
        self
    }

    /// Returns true if the template has any expectation or format constraint.
    #[must_use]
    pub fn has_constraints(&self) -> bool {
        self.format.is_some() || self.expectations.as_ref().is_some_and(|e| !e.is_empty())
    }
}
