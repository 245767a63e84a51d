//! Jokers and retried attempts of a single template.

use super::expectations::check_template_constraints;
use super::result::TemplateExecution;
use super::retry::RetryBackoff;
use super::tools::ExecutionTool;
use super::usage::Usage;
use crate::errors::{PipelineExecutionError, PromptbookError, UnexpectedError};
use crate::pipeline::{Parameters, TemplateJson};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a spawned template task owns.
pub(crate) struct TemplateRun {
    pub(crate) index: usize,
    pub(crate) template: TemplateJson,
    pub(crate) parameters: Parameters,
    pub(crate) tool: Arc<dyn ExecutionTool>,
    pub(crate) max_attempts: usize,
    pub(crate) backoff: RetryBackoff,
}

/// What a template task reports back to the scheduler.
pub(crate) struct TemplateOutcome {
    pub(crate) index: usize,
    pub(crate) result: Result<String, PromptbookError>,
    pub(crate) executions: Vec<TemplateExecution>,
}

impl TemplateRun {
    pub(crate) async fn run(self) -> TemplateOutcome {
        let mut executions = Vec::new();
        let result = self.resolve(&mut executions).await;
        TemplateOutcome {
            index: self.index,
            result,
            executions,
        }
    }

    fn record(
        &self,
        attempt: isize,
        result: Option<String>,
        error: Option<&PromptbookError>,
        usage: Usage,
    ) -> TemplateExecution {
        TemplateExecution {
            template_name: self.template.name.clone(),
            resulting_parameter_name: self.template.resulting_parameter_name.clone(),
            attempt,
            result,
            error: error.map(PromptbookError::to_json),
            usage,
        }
    }

    async fn resolve(&self, executions: &mut Vec<TemplateExecution>) -> Result<String, PromptbookError> {
        let name = &self.template.resulting_parameter_name;

        // Jokers are tried first, most preferred first, and cost nothing.
        for (position, joker) in self.template.joker_parameter_names.iter().enumerate() {
            let attempt = -(position as isize) - 1;
            let Some(value) = self.parameters.get(joker) else {
                return Err(UnexpectedError::new(format!(
                    "Joker parameter {{{joker}}} of {{{name}}} has no value"
                ))
                .into());
            };

            match check_template_constraints(&self.template, value) {
                Ok(()) => {
                    debug!(template = %self.template.name, joker = %joker, "Joker satisfies expectations");
                    executions.push(self.record(attempt, Some(value.clone()), None, Usage::zero()));
                    return Ok(value.clone());
                }
                Err(e) => {
                    executions.push(self.record(attempt, Some(value.clone()), Some(&e), Usage::zero()));
                }
            }
        }

        let max_attempts = self.max_attempts.max(1);
        let mut failures = Vec::new();

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay_for_retry(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let attempt_index = attempt as isize;
            match self.tool.execute(&self.template, &self.parameters).await {
                Ok(output) => match check_template_constraints(&self.template, &output.value) {
                    Ok(()) => {
                        executions.push(self.record(attempt_index, Some(output.value.clone()), None, output.usage));
                        return Ok(output.value);
                    }
                    Err(e) => {
                        warn!(
                            template = %self.template.name,
                            attempt = attempt + 1,
                            error = %e,
                            "Result does not meet expectations"
                        );
                        failures.push(format!("Attempt {}: {e}", attempt + 1));
                        executions.push(self.record(attempt_index, Some(output.value), Some(&e), output.usage));
                    }
                },
                Err(e) if e.is_unexpected() => {
                    executions.push(self.record(attempt_index, None, Some(&e), Usage::zero()));
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        template = %self.template.name,
                        attempt = attempt + 1,
                        error = %e,
                        "Attempt failed"
                    );
                    failures.push(format!("Attempt {}: {e}", attempt + 1));
                    executions.push(self.record(attempt_index, None, Some(&e), Usage::zero()));
                }
            }
        }

        Err(PipelineExecutionError::new(format!(
            "Template {{{name}}} failed after {max_attempts} attempts:\n\n{}",
            failures.join("\n")
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::tools::{MockExecutionTool, ToolResult};
    use crate::pipeline::ExpectationUnit;
    use pretty_assertions::assert_eq;

    fn run(template: TemplateJson, parameters: Parameters, tool: MockExecutionTool) -> TemplateRun {
        TemplateRun {
            index: 0,
            template,
            parameters,
            tool: Arc::new(tool),
            max_attempts: 3,
            backoff: RetryBackoff::default(),
        }
    }

    fn three_words() -> TemplateJson {
        TemplateJson::simple("out", "x").with_expectation(ExpectationUnit::Words, Some(3), None)
    }

    #[tokio::test]
    async fn test_first_attempt_passes() {
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(1)
            .returning(|_, _| Ok(ToolResult::free("one two three")));

        let outcome = run(three_words(), Parameters::new(), tool).run().await;
        assert_eq!(outcome.result.unwrap(), "one two three");
        assert_eq!(outcome.executions.len(), 1);
        assert_eq!(outcome.executions[0].attempt, 0);
    }

    #[tokio::test]
    async fn test_retries_until_expectations_met() {
        let mut seq = mockall::Sequence::new();
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ToolResult::free("short")));
        tool.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ToolResult::free("long enough now")));

        let outcome = run(three_words(), Parameters::new(), tool).run().await;
        assert_eq!(outcome.result.unwrap(), "long enough now");
        assert_eq!(outcome.executions.len(), 3);
        assert!(outcome.executions[0].error.is_some());
        assert!(outcome.executions[2].error.is_none());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(3)
            .returning(|_, _| Ok(ToolResult::free("nope")));

        let outcome = run(three_words(), Parameters::new(), tool).run().await;
        let err = outcome.result.unwrap_err();
        assert_eq!(err.name(), "PipelineExecutionError");
        assert!(err.to_string().contains("failed after 3 attempts"));
        assert!(err.to_string().contains("Expected at least 3 words but got 1"));
        assert_eq!(outcome.executions.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_errors_are_retried() {
        let mut seq = mockall::Sequence::new();
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(PipelineExecutionError::new("rate limited").into()));
        tool.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ToolResult::free("a b c")));

        let outcome = run(three_words(), Parameters::new(), tool).run().await;
        assert_eq!(outcome.result.unwrap(), "a b c");
    }

    #[tokio::test]
    async fn test_unexpected_errors_are_not_retried() {
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(1)
            .returning(|_, _| Err(UnexpectedError::new("bug").into()));

        let outcome = run(three_words(), Parameters::new(), tool).run().await;
        assert!(outcome.result.unwrap_err().is_unexpected());
    }

    #[tokio::test]
    async fn test_passing_joker_skips_tool() {
        let mut tool = MockExecutionTool::new();
        tool.expect_execute().times(0);

        let template = three_words().with_dependencies(["bad", "good"]).with_joker("bad").with_joker("good");
        let mut parameters = Parameters::new();
        parameters.insert("bad".into(), "too short".into());
        parameters.insert("good".into(), "this one is fine".into());

        let outcome = run(template, parameters, tool).run().await;
        assert_eq!(outcome.result.unwrap(), "this one is fine");
        assert_eq!(outcome.executions.len(), 2);
        assert_eq!(outcome.executions[0].attempt, -1);
        assert_eq!(outcome.executions[1].attempt, -2);
        assert!(outcome.executions.iter().all(|e| e.usage.is_zero()));
    }

    #[tokio::test]
    async fn test_failing_jokers_fall_back_to_attempts() {
        let mut tool = MockExecutionTool::new();
        tool.expect_execute()
            .times(1)
            .returning(|_, _| Ok(ToolResult::free("generated three words")));

        let template = three_words().with_dependency("draft").with_joker("draft");
        let mut parameters = Parameters::new();
        parameters.insert("draft".into(), "short".into());

        let outcome = run(template, parameters, tool).run().await;
        assert_eq!(outcome.result.unwrap(), "generated three words");
    }
}
