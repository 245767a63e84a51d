//! `{parameter}` placeholder handling.

use crate::errors::{PipelineExecutionError, PromptbookError};
use crate::pipeline::Parameters;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Returns the parameter names referenced in a template body.
#[must_use]
pub fn extract_parameter_names(content: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(content)
        .map(|captures| captures[1].to_string())
        .collect()
}

/// Substitutes every `{name}` placeholder with its value.
///
/// # Errors
///
/// Returns a [`PipelineExecutionError`] if a placeholder has no value.
pub fn replace_parameters(content: &str, parameters: &Parameters) -> Result<String, PromptbookError> {
    if let Some(missing) = extract_parameter_names(content)
        .into_iter()
        .find(|name| !parameters.contains_key(name))
    {
        return Err(PipelineExecutionError::new(format!("Parameter {{{missing}}} is not defined")).into());
    }

    Ok(PLACEHOLDER
        .replace_all(content, |captures: &Captures<'_>| parameters[&captures[1]].clone())
        .into_owned())
}
