//! Structural and semantic validation of pipelines.
//!
//! [`validate_pipeline`] is pure and idempotent: it performs no I/O and never
//! mutates the pipeline, so it is safe to call at every boundary a pipeline
//! crosses (loading, collecting, archiving, executing).

mod formats;
mod resolution;

pub use formats::{is_valid_pipeline_url, is_valid_promptbook_version};
pub use resolution::{check_resolvable, loop_limit, ResolutionState, LOOP_LIMIT};

use crate::errors::{PipelineLogicError, PromptbookError};
use crate::pipeline::{is_reserved_parameter_name, BlockType, PipelineJson};
use std::collections::HashSet;

/// Checks that a pipeline is logically well-formed.
///
/// # Errors
///
/// Returns a [`PipelineLogicError`] describing the first violation found, or an
/// [`UnexpectedError`](crate::errors::UnexpectedError) if resolution overruns
/// its loop limit.
pub fn validate_pipeline(pipeline: &PipelineJson) -> Result<(), PromptbookError> {
    validate_header(pipeline)?;
    validate_parameters(pipeline)?;
    validate_templates(pipeline)?;
    check_resolvable(pipeline)
}

/// Validates a pipeline and hands it back.
///
/// # Errors
///
/// Same as [`validate_pipeline`].
pub fn validated(pipeline: PipelineJson) -> Result<PipelineJson, PromptbookError> {
    validate_pipeline(&pipeline)?;
    Ok(pipeline)
}

fn logic(message: String) -> PromptbookError {
    PipelineLogicError::new(message).into()
}

fn validate_header(pipeline: &PipelineJson) -> Result<(), PromptbookError> {
    if let Some(url) = &pipeline.pipeline_url {
        if !is_valid_pipeline_url(url) {
            return Err(logic(format!("Invalid promptbook URL \"{url}\"")));
        }
    }

    if !is_valid_promptbook_version(&pipeline.promptbook_version) {
        return Err(logic(format!(
            "Invalid Promptbook Version \"{}\"",
            pipeline.promptbook_version
        )));
    }

    Ok(())
}

fn validate_parameters(pipeline: &PipelineJson) -> Result<(), PromptbookError> {
    let mut seen = HashSet::new();

    for parameter in &pipeline.parameters {
        let name = &parameter.name;

        if !seen.insert(name.as_str()) {
            return Err(logic(format!("Parameter {{{name}}} is declared multiple times")));
        }

        if parameter.is_input && parameter.is_output {
            return Err(logic(format!("Parameter {{{name}}} can not be both input and output")));
        }

        let is_consumed = pipeline
            .templates
            .iter()
            .any(|t| t.dependent_parameter_names.contains(name));
        if !parameter.is_input && !parameter.is_output && !is_consumed {
            return Err(logic(format!(
                "Parameter {{{name}}} is created but not used\n\n\
                 You can declare {{{name}}} as output parameter or use it in some template"
            )));
        }

        let is_produced = pipeline
            .templates
            .iter()
            .any(|t| &t.resulting_parameter_name == name);
        if !parameter.is_input && !is_produced {
            return Err(logic(format!(
                "Parameter {{{name}}} is declared but not defined\n\n\
                 You can do one of these:\n\
                 1) Remove declaration of {{{name}}}\n\
                 2) Add template that results in {{{name}}}"
            )));
        }
    }

    Ok(())
}

fn validate_templates(pipeline: &PipelineJson) -> Result<(), PromptbookError> {
    let mut defined: HashSet<&str> = pipeline
        .input_parameters()
        .map(|p| p.name.as_str())
        .collect();

    for template in &pipeline.templates {
        let result = template.resulting_parameter_name.as_str();

        if defined.contains(result) {
            return Err(logic(format!("Parameter {{{result}}} is defined multiple times")));
        }

        if is_reserved_parameter_name(result) {
            return Err(logic(format!(
                "Parameter name {{{result}}} is reserved, please use different name"
            )));
        }

        defined.insert(result);

        if template.block_type == BlockType::Prompt
            && template
                .model_requirements
                .as_ref()
                .and_then(|r| r.model_variant)
                .is_none()
        {
            return Err(logic(format!(
                "You must specify MODEL VARIANT in the prompt template \"{}\"",
                template.title
            )));
        }

        if !template.joker_parameter_names.is_empty() {
            if !template.has_constraints() {
                return Err(logic(format!(
                    "Joker parameters are used for {{{result}}} but no expectations are defined"
                )));
            }

            for joker in &template.joker_parameter_names {
                if !template.dependent_parameter_names.contains(joker) {
                    return Err(logic(format!(
                        "Parameter {{{joker}}} is used for {{{result}}} as joker but not in `dependentParameterNames`"
                    )));
                }
            }
        }

        if let Some(expectations) = &template.expectations {
            for (unit, amounts) in expectations {
                if let (Some(min), Some(max)) = (amounts.min, amounts.max) {
                    if min > max {
                        return Err(logic(format!(
                            "Min expectation (={min}) of {unit} is higher than max expectation (={max})"
                        )));
                    }
                }

                // min is unsigned, so "min >= 0" holds by construction
                if amounts.max == Some(0) {
                    return Err(logic(format!("Max expectation of {unit} must be positive")));
                }
            }
        }
    }

    Ok(())
}
