//! Testing utilities for promptbook pipelines.
//!
//! This module provides:
//! - Deterministic execution tools (echo, failing, flaky, slow)
//! - Ready-made pipelines
//! - Assertions for execution results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_error_contains, assert_failed, assert_succeeded, assert_warning_contains};
pub use fixtures::{chain_pipeline, fan_out_pipeline, hello_pipeline, inputs};
pub use mocks::{ConcurrencyProbeTool, EchoTool, FailingTool, FlakyTool};
