//! Parameter resolution state shared by the validator and the executor.
//!
//! Resolution starts from the input parameters plus the reserved names and
//! repeatedly releases every template whose dependencies are all resolved.
//! The validator runs it dry; the executor launches each released template.

use crate::errors::{PipelineLogicError, PromptbookError, UnexpectedError};
use crate::pipeline::{PipelineJson, TemplateJson, RESERVED_PARAMETER_NAMES};
use std::collections::HashSet;

/// Minimum number of resolution rounds allowed for any pipeline.
pub const LOOP_LIMIT: usize = 1000;

/// Round budget for resolving a pipeline with `template_count` templates.
///
/// Every round of the executor either launches or completes at least one
/// template, so `2 * template_count + 1` rounds always suffice for an
/// acyclic pipeline.
#[must_use]
pub fn loop_limit(template_count: usize) -> usize {
    LOOP_LIMIT.max(template_count.saturating_mul(2).saturating_add(1))
}

/// Resolved parameter names and templates not yet released.
#[derive(Debug, Clone)]
pub struct ResolutionState<'a> {
    templates: &'a [TemplateJson],
    resolved: HashSet<String>,
    resolved_order: Vec<String>,
    pending: Vec<usize>,
}

impl<'a> ResolutionState<'a> {
    /// Starts resolution for a pipeline.
    #[must_use]
    pub fn new(pipeline: &'a PipelineJson) -> Self {
        let mut state = Self {
            templates: &pipeline.templates,
            resolved: HashSet::new(),
            resolved_order: Vec::new(),
            pending: (0..pipeline.templates.len()).collect(),
        };

        for parameter in pipeline.input_parameters() {
            state.resolve(parameter.name.clone());
        }
        for name in RESERVED_PARAMETER_NAMES {
            state.resolved.insert(name.to_string());
        }

        state
    }

    /// Marks a parameter as resolved.
    pub fn resolve(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.resolved.insert(name.clone()) {
            self.resolved_order.push(name);
        }
    }

    /// Returns true if the parameter is resolved.
    #[must_use]
    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolved.contains(name)
    }

    /// Removes and returns the indices of all templates whose dependencies are resolved.
    pub fn take_ready(&mut self) -> Vec<usize> {
        let (ready, pending): (Vec<usize>, Vec<usize>) = self.pending.iter().partition(|&&index| {
            self.templates[index]
                .dependent_parameter_names
                .iter()
                .all(|name| self.resolved.contains(name))
        });
        self.pending = pending;
        ready
    }

    /// Returns true when every template has been released.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of templates not yet released.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Builds the error reported when no pending template can be released.
    #[must_use]
    pub fn unresolvable_error(&self) -> PipelineLogicError {
        let unresolved: Vec<String> = self
            .pending
            .iter()
            .map(|&index| {
                let template = &self.templates[index];
                let deps: Vec<String> = template
                    .dependent_parameter_names
                    .iter()
                    .map(|name| format!("{{{name}}}"))
                    .collect();
                format!(
                    "- Parameter {{{}}} which depends on {}",
                    template.resulting_parameter_name,
                    deps.join(" and ")
                )
            })
            .collect();

        let resolved: Vec<String> = if self.resolved_order.is_empty() {
            vec!["- (nothing)".to_string()]
        } else {
            self.resolved_order
                .iter()
                .map(|name| format!("- Parameter {{{name}}}"))
                .collect()
        };

        PipelineLogicError::new(format!(
            "Can not resolve some parameters:\n\
             Either you are using a parameter that is not defined, or there are some circular dependencies.\n\n\
             Can not resolve:\n{}\n\n\
             Resolved:\n{}",
            unresolved.join("\n"),
            resolved.join("\n"),
        ))
    }
}

/// Proves that every template can eventually run.
///
/// Runs resolution without side effects. A stuck state is a
/// [`PipelineLogicError`]; running past [`loop_limit`] is an [`UnexpectedError`].
pub fn check_resolvable(pipeline: &PipelineJson) -> Result<(), PromptbookError> {
    let mut state = ResolutionState::new(pipeline);
    let limit = loop_limit(pipeline.templates.len());
    let mut rounds = 0;

    while !state.is_complete() {
        rounds += 1;
        if rounds > limit {
            return Err(UnexpectedError::new(
                "Loop limit reached during detection of circular dependencies",
            )
            .into());
        }

        let ready = state.take_ready();
        if ready.is_empty() {
            return Err(state.unresolvable_error().into());
        }

        for index in ready {
            state.resolve(pipeline.templates[index].resulting_parameter_name.clone());
        }
    }

    Ok(())
}
