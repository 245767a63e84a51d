//! The pipeline executor.
//!
//! Templates are launched as soon as all their dependencies are resolved and
//! run as spawned tasks, at most `max_parallel_count` at a time. The first
//! template that gives up stops the execution: templates still running are
//! aborted and whatever they already reported is kept in the execution report.

use super::attempts::{TemplateOutcome, TemplateRun};
use super::preparation::prepare_pipeline;
use super::progress::{ProgressGate, ProgressSink, TaskProgress};
use super::result::{ExecutionReport, ExecutionResult};
use super::settings::ExecutorSettings;
use super::templating::extract_parameter_names;
use super::tools::ExecutionTools;
use crate::errors::{ErrorJson, PipelineExecutionError, PromptbookError, UnexpectedError};
use crate::pipeline::{
    is_pipeline_prepared, Parameters, PipelineJson, TemplateJson, RESERVED_PARAMETER_MISSING_VALUE,
    RESERVED_PARAMETER_NAMES,
};
use crate::validation::{loop_limit, validate_pipeline, ResolutionState};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Runs one pipeline any number of times.
///
/// The executor never mutates its pipeline. Concurrent calls to
/// [`PipelineExecutor::execute`] share nothing but the lazily prepared
/// pipeline.
pub struct PipelineExecutor {
    pipeline: Arc<PipelineJson>,
    prepared: OnceCell<Arc<PipelineJson>>,
    tools: ExecutionTools,
    settings: ExecutorSettings,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("pipeline", &self.pipeline.display_name())
            .field("tools", &self.tools)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Creates an executor for a pipeline.
///
/// # Errors
///
/// Returns the validation error if the pipeline is invalid.
pub fn create_executor(
    pipeline: PipelineJson,
    tools: ExecutionTools,
    settings: ExecutorSettings,
) -> Result<PipelineExecutor, PromptbookError> {
    PipelineExecutor::new(pipeline, tools, settings)
}

impl PipelineExecutor {
    /// Validates the pipeline and creates an executor for it.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the pipeline is invalid.
    pub fn new(
        pipeline: PipelineJson,
        tools: ExecutionTools,
        settings: ExecutorSettings,
    ) -> Result<Self, PromptbookError> {
        validate_pipeline(&pipeline)?;

        let pipeline = Arc::new(pipeline);
        let prepared = if is_pipeline_prepared(&pipeline) {
            OnceCell::new_with(Some(pipeline.clone()))
        } else {
            OnceCell::new()
        };

        Ok(Self {
            pipeline,
            prepared,
            tools,
            settings,
        })
    }

    /// The pipeline as given.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineJson {
        &self.pipeline
    }

    /// The settings.
    #[must_use]
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Executes the pipeline.
    ///
    /// Never fails: problems are reported in the returned result. `progress`
    /// receives one notification per template state change, all of them
    /// before this method returns.
    pub async fn execute(
        &self,
        input: &Parameters,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> ExecutionResult {
        let gate = ProgressGate::new(progress);
        let result = self.run(input, &gate).await;
        gate.finish();

        if self.settings.is_verbose {
            info!(
                pipeline = %self.pipeline.display_name(),
                is_successful = result.is_successful,
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "Pipeline executed"
            );
        } else {
            debug!(
                pipeline = %self.pipeline.display_name(),
                is_successful = result.is_successful,
                "Pipeline executed"
            );
        }

        result
    }

    async fn prepared_pipeline(
        &self,
        warnings: &mut Vec<ErrorJson>,
    ) -> Result<Arc<PipelineJson>, PromptbookError> {
        if is_pipeline_prepared(&self.pipeline) {
            return Ok(self.pipeline.clone());
        }

        warnings.push(execution_error(format!(
            "Pipeline {} is executed before it was prepared, it is prepared on the fly. \
             Prepare it ahead of time with `prepare_pipeline` and reuse the prepared pipeline",
            self.pipeline.display_name()
        )));

        let prepared = self
            .prepared
            .get_or_try_init(|| async {
                prepare_pipeline(&self.pipeline, &self.tools).await.map(Arc::new)
            })
            .await?;
        Ok(prepared.clone())
    }

    async fn run(&self, input: &Parameters, gate: &ProgressGate) -> ExecutionResult {
        let mut warnings = Vec::new();
        let mut report = ExecutionReport::for_pipeline(&self.pipeline);

        let pipeline = match self.prepared_pipeline(&mut warnings).await {
            Ok(pipeline) => pipeline,
            Err(e) => {
                return ExecutionResult::failure(vec![e.to_json()], warnings, Parameters::new(), report)
            }
        };

        if let Err(errors) = check_input_parameters(&pipeline, input, &mut warnings) {
            return ExecutionResult::failure(errors, warnings, Parameters::new(), report);
        }

        let mut values: Parameters = input
            .iter()
            .filter(|(name, _)| pipeline.parameter(name).is_some())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let current_date = Utc::now().to_rfc3339();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_parallel_count.max(1)));
        let mut state = ResolutionState::new(&pipeline);
        let mut running: JoinSet<TemplateOutcome> = JoinSet::new();
        let limit = loop_limit(pipeline.templates.len());
        let mut rounds = 0;

        let failure: Option<PromptbookError> = loop {
            rounds += 1;
            if rounds > limit {
                break Some(UnexpectedError::new("Loop limit reached during pipeline execution").into());
            }

            if state.is_complete() && running.is_empty() {
                break None;
            }

            let ready = state.take_ready();
            if !ready.is_empty() {
                let mut launch_error = None;

                for index in ready {
                    let template = &pipeline.templates[index];
                    match self.template_run(&pipeline, index, &values, &current_date) {
                        Ok(run) => {
                            debug!(template = %template.name, "Launching template");
                            gate.emit(TaskProgress::started(template));
                            let semaphore = semaphore.clone();
                            running.spawn(async move {
                                let index = run.index;
                                match semaphore.acquire_owned().await {
                                    Ok(_permit) => run.run().await,
                                    Err(e) => TemplateOutcome {
                                        index,
                                        result: Err(UnexpectedError::new(format!("Semaphore closed: {e}")).into()),
                                        executions: Vec::new(),
                                    },
                                }
                            });
                        }
                        Err(e) => {
                            gate.emit(TaskProgress::failed(template, &e));
                            launch_error = Some(e);
                            break;
                        }
                    }
                }

                if launch_error.is_some() {
                    break launch_error;
                }
                continue;
            }

            let Some(joined) = running.join_next().await else {
                break Some(
                    UnexpectedError::new(format!(
                        "Execution got stuck with {} templates left\n\n{}",
                        state.pending_count(),
                        state.unresolvable_error()
                    ))
                    .into(),
                );
            };

            match joined {
                Ok(outcome) => {
                    report.executions.extend(outcome.executions);
                    let template = &pipeline.templates[outcome.index];
                    match outcome.result {
                        Ok(value) => {
                            gate.emit(TaskProgress::completed(template, &value));
                            let name = template.resulting_parameter_name.clone();
                            values.insert(name.clone(), value);
                            state.resolve(name);
                        }
                        Err(e) => {
                            gate.emit(TaskProgress::failed(template, &e));
                            break Some(e);
                        }
                    }
                }
                Err(join_error) => {
                    break Some(
                        UnexpectedError::new(format!("Template task did not complete: {join_error}")).into(),
                    );
                }
            }
        };

        if let Some(error) = failure {
            warn!(
                pipeline = %pipeline.display_name(),
                error = %error,
                running = running.len(),
                "Pipeline execution failed"
            );
            running.abort_all();
            while let Some(joined) = running.join_next().await {
                if let Ok(outcome) = joined {
                    report.executions.extend(outcome.executions);
                }
            }

            let outputs = output_values(&pipeline, &values, None);
            return ExecutionResult::failure(vec![error.to_json()], warnings, outputs, report);
        }

        let outputs = output_values(&pipeline, &values, Some(&mut warnings));
        ExecutionResult::success(outputs, warnings, report)
    }

    fn template_run(
        &self,
        pipeline: &PipelineJson,
        index: usize,
        values: &Parameters,
        current_date: &str,
    ) -> Result<TemplateRun, PromptbookError> {
        let template = &pipeline.templates[index];
        let tool = self.tools.tool_for(template.block_type)?;
        let mut parameters = reserved_parameters(pipeline, template, current_date);

        for name in extract_parameter_names(&template.content) {
            if !template.dependent_parameter_names.contains(&name) && !parameters.contains_key(&name) {
                return Err(PipelineExecutionError::new(format!(
                    "Parameter {{{name}}} is used in template {{{}}} but it is not listed in its dependencies",
                    template.resulting_parameter_name
                ))
                .into());
            }
        }

        for dependency in &template.dependent_parameter_names {
            if let Some(value) = values.get(dependency) {
                parameters.insert(dependency.clone(), value.clone());
            } else if !parameters.contains_key(dependency) {
                return Err(UnexpectedError::new(format!(
                    "Parameter {{{dependency}}} is not resolved but template {{{}}} was launched",
                    template.resulting_parameter_name
                ))
                .into());
            }
        }

        Ok(TemplateRun {
            index,
            template: template.clone(),
            parameters,
            tool,
            max_attempts: self.settings.max_execution_attempts,
            backoff: self.settings.retry_backoff.clone(),
        })
    }
}

fn execution_error(message: String) -> ErrorJson {
    PromptbookError::from(PipelineExecutionError::new(message)).to_json()
}

fn check_input_parameters(
    pipeline: &PipelineJson,
    input: &Parameters,
    warnings: &mut Vec<ErrorJson>,
) -> Result<(), Vec<ErrorJson>> {
    let mut errors = Vec::new();

    for parameter in pipeline.input_parameters() {
        if !input.contains_key(&parameter.name) {
            errors.push(execution_error(format!(
                "Parameter {{{}}} is required as an input parameter",
                parameter.name
            )));
        }
    }

    for name in input.keys() {
        match pipeline.parameter(name) {
            None => warnings.push(execution_error(format!(
                "Extra parameter {{{name}}} is being passed which is not part of the pipeline."
            ))),
            Some(parameter) if !parameter.is_input => errors.push(execution_error(format!(
                "Parameter {{{name}}} is passed as input parameter but it is not input"
            ))),
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Values of the reserved parameters as seen by one template.
fn reserved_parameters(pipeline: &PipelineJson, template: &TemplateJson, current_date: &str) -> Parameters {
    let mut reserved: Parameters = RESERVED_PARAMETER_NAMES
        .iter()
        .map(|name| ((*name).to_string(), RESERVED_PARAMETER_MISSING_VALUE.to_string()))
        .collect();

    reserved.insert("currentDate".to_string(), current_date.to_string());

    if !pipeline.knowledge_pieces.is_empty() {
        let knowledge: Vec<&str> = pipeline
            .knowledge_pieces
            .iter()
            .map(|piece| piece.content.as_str())
            .collect();
        reserved.insert("knowledge".to_string(), knowledge.join("\n\n"));
    }

    if let Some(parameter) = pipeline.parameter(&template.resulting_parameter_name) {
        if !parameter.example_values.is_empty() {
            reserved.insert("examples".to_string(), parameter.example_values.join("\n"));
        }
    }

    if let Some(model_name) = template
        .model_requirements
        .as_ref()
        .and_then(|requirements| requirements.model_name.clone())
    {
        reserved.insert("modelName".to_string(), model_name);
    }

    reserved
}

fn output_values(
    pipeline: &PipelineJson,
    values: &Parameters,
    mut warnings: Option<&mut Vec<ErrorJson>>,
) -> Parameters {
    let mut outputs = Parameters::new();

    for parameter in pipeline.output_parameters() {
        match values.get(&parameter.name) {
            Some(value) => {
                outputs.insert(parameter.name.clone(), value.clone());
            }
            None => {
                if let Some(warnings) = warnings.as_deref_mut() {
                    warnings.push(execution_error(format!(
                        "Parameter {{{}}} should be an output parameter, but it was not generated during pipeline execution",
                        parameter.name
                    )));
                }
            }
        }
    }

    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ModelRequirements, ModelVariant, ParameterJson};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reserved_parameters() {
        let pipeline = PipelineJson::new("Reserved")
            .with_parameter(ParameterJson::output("greeting").with_example("Hello"))
            .with_template(
                TemplateJson::prompt("greeting", "{examples}").with_model_requirements(ModelRequirements {
                    model_name: Some("gpt-4".into()),
                    ..ModelRequirements::variant(ModelVariant::Chat)
                }),
            );

        let reserved = reserved_parameters(&pipeline, &pipeline.templates[0], "2024-01-01T00:00:00Z");
        assert_eq!(reserved.len(), RESERVED_PARAMETER_NAMES.len());
        assert_eq!(reserved["currentDate"], "2024-01-01T00:00:00Z");
        assert_eq!(reserved["examples"], "Hello");
        assert_eq!(reserved["modelName"], "gpt-4");
        assert_eq!(reserved["knowledge"], RESERVED_PARAMETER_MISSING_VALUE);
        assert_eq!(reserved["context"], RESERVED_PARAMETER_MISSING_VALUE);
    }

    #[test]
    fn test_input_checks() {
        let pipeline = PipelineJson::new("Inputs")
            .with_parameter(ParameterJson::input("a"))
            .with_parameter(ParameterJson::output("b"))
            .with_template(TemplateJson::simple("b", "{a}").with_dependency("a"));

        let mut warnings = Vec::new();
        let mut input = Parameters::new();
        input.insert("a".into(), "1".into());
        input.insert("zzz".into(), "?".into());
        assert!(check_input_parameters(&pipeline, &input, &mut warnings).is_ok());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Extra parameter {zzz}"));

        let mut input = Parameters::new();
        input.insert("b".into(), "1".into());
        let errors = check_input_parameters(&pipeline, &input, &mut warnings).unwrap_err();
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Parameter {a} is required as an input parameter",
                "Parameter {b} is passed as input parameter but it is not input",
            ]
        );
    }
}
