//! Pipelines and inputs for tests.

use crate::pipeline::{ParameterJson, Parameters, PipelineJson, TemplateJson};

/// Builds input parameters from pairs.
#[must_use]
pub fn inputs(pairs: &[(&str, &str)]) -> Parameters {
    pairs
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect()
}

/// One input `{thing}`, one output `{response}`, one prompt template.
#[must_use]
pub fn hello_pipeline() -> PipelineJson {
    PipelineJson::new("Hello")
        .with_url("https://promptbook.studio/examples/hello.book.md")
        .with_parameter(ParameterJson::input("thing").with_description("Something to buy"))
        .with_parameter(ParameterJson::output("response"))
        .with_template(
            TemplateJson::prompt("response", "One day I bought {thing}. Now I have {thing}.")
                .with_title("Buying")
                .with_dependency("thing"),
        )
}

/// `{input}` flows through `length` simple templates `{step1}`..`{stepN}`.
///
/// # Panics
///
/// Panics if `length` is zero.
#[must_use]
pub fn chain_pipeline(length: usize) -> PipelineJson {
    assert!(length > 0, "chain needs at least one step");

    let mut pipeline = PipelineJson::new("Chain").with_parameter(ParameterJson::input("input"));
    let mut previous = "input".to_string();

    for step in 1..=length {
        let name = format!("step{step}");
        let parameter = if step == length {
            ParameterJson::output(&name)
        } else {
            ParameterJson::new(&name)
        };
        pipeline = pipeline.with_parameter(parameter).with_template(
            TemplateJson::simple(&name, format!("{{{previous}}}+"))
                .with_dependency(&previous),
        );
        previous = name;
    }

    pipeline
}

/// `{input}` fans out to `width` independent prompt templates `{branch1}`..,
/// each of them an output.
#[must_use]
pub fn fan_out_pipeline(width: usize) -> PipelineJson {
    let mut pipeline = PipelineJson::new("Fan out").with_parameter(ParameterJson::input("input"));

    for branch in 1..=width {
        let name = format!("branch{branch}");
        pipeline = pipeline
            .with_parameter(ParameterJson::output(&name))
            .with_template(
                TemplateJson::prompt(&name, format!("Branch {branch} of {{input}}"))
                    .with_dependency("input"),
            );
    }

    pipeline
}
