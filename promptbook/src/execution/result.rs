//! Execution results and reports.

use super::usage::{add_usage, Usage};
use crate::errors::ErrorJson;
use crate::pipeline::{Parameters, PipelineJson};
use serde::{Deserialize, Serialize};

/// One attempt (or joker check) of one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateExecution {
    /// Template name.
    pub template_name: String,
    /// Parameter the template produces.
    pub resulting_parameter_name: String,
    /// Attempt index; jokers are numbered below zero.
    pub attempt: isize,
    /// Candidate value, if one was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Why the attempt was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorJson>,
    /// Cost of the attempt.
    pub usage: Usage,
}

/// Trace of everything one execution did.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// URL of the executed pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_url: Option<String>,
    /// Title of the executed pipeline.
    pub title: String,
    /// Version of the executed pipeline.
    pub promptbook_version: String,
    /// Attempts in completion order.
    pub executions: Vec<TemplateExecution>,
}

impl ExecutionReport {
    /// Starts an empty report for a pipeline.
    #[must_use]
    pub fn for_pipeline(pipeline: &PipelineJson) -> Self {
        Self {
            pipeline_url: pipeline.pipeline_url.clone(),
            title: pipeline.title.clone(),
            promptbook_version: pipeline.promptbook_version.clone(),
            executions: Vec::new(),
        }
    }

    /// Total usage of all recorded attempts.
    #[must_use]
    pub fn usage(&self) -> Usage {
        add_usage(self.executions.iter().map(|execution| &execution.usage))
    }
}

/// Outcome of one pipeline execution.
///
/// Expected failures never escape as `Err`; they land in `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// True when every template produced a value.
    pub is_successful: bool,
    /// Errors, the one that stopped execution first.
    pub errors: Vec<ErrorJson>,
    /// Non-fatal problems.
    pub warnings: Vec<ErrorJson>,
    /// Values of the output parameters that were produced.
    pub output_parameters: Parameters,
    /// Total usage of all attempts.
    pub usage: Usage,
    /// Trace of the execution.
    pub execution_report: ExecutionReport,
}

impl ExecutionResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(
        output_parameters: Parameters,
        warnings: Vec<ErrorJson>,
        execution_report: ExecutionReport,
    ) -> Self {
        Self {
            is_successful: true,
            errors: Vec::new(),
            warnings,
            output_parameters,
            usage: execution_report.usage(),
            execution_report,
        }
    }

    /// Builds an unsuccessful result.
    #[must_use]
    pub fn failure(
        errors: Vec<ErrorJson>,
        warnings: Vec<ErrorJson>,
        output_parameters: Parameters,
        execution_report: ExecutionReport,
    ) -> Self {
        Self {
            is_successful: false,
            errors,
            warnings,
            output_parameters,
            usage: execution_report.usage(),
            execution_report,
        }
    }

    /// Value of an output parameter.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<&str> {
        self.output_parameters.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::usage::{UncertainNumber, Usage};

    #[test]
    fn test_usage_is_derived_from_report() {
        let mut report = ExecutionReport::for_pipeline(&PipelineJson::new("Report"));
        for attempt in 0..3 {
            report.executions.push(TemplateExecution {
                template_name: "a".into(),
                resulting_parameter_name: "a".into(),
                attempt,
                result: None,
                error: None,
                usage: Usage::zero().with_price(UncertainNumber::exact(1.0)),
            });
        }

        let result = ExecutionResult::failure(vec![], vec![], Parameters::new(), report);
        assert_eq!(result.usage.price.value, 3.0);
        assert!(!result.is_successful);
    }

    #[test]
    fn test_json_shape() {
        let mut outputs = Parameters::new();
        outputs.insert("response".into(), "hi".into());
        let result = ExecutionResult::success(outputs, vec![], ExecutionReport::default());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isSuccessful"], true);
        assert_eq!(json["outputParameters"]["response"], "hi");
        assert!(json["executionReport"]["executions"].as_array().unwrap().is_empty());
        assert_eq!(result.output("response"), Some("hi"));
    }
}
