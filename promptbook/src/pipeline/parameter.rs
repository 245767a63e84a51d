//! Pipeline parameter declarations.

use serde::{Deserialize, Serialize};

/// A parameter declared in the pipeline header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterJson {
    /// The parameter name, referenced as `{name}` in templates.
    pub name: String,
    /// Whether the caller must supply this parameter.
    #[serde(default)]
    pub is_input: bool,
    /// Whether the parameter is returned to the caller.
    #[serde(default)]
    pub is_output: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Example values, exposed to templates through `{examples}`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub example_values: Vec<String>,
}

impl ParameterJson {
    /// Creates an intermediate parameter (neither input nor output).
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_input: false,
            is_output: false,
            description: None,
            example_values: Vec::new(),
        }
    }

    /// Creates an input parameter.
    #[must_use]
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            is_input: true,
            ..Self::new(name)
        }
    }

    /// Creates an output parameter.
    #[must_use]
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            is_output: true,
            ..Self::new(name)
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds an example value.
    #[must_use]
    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example_values.push(example.into());
        self
    }
}
