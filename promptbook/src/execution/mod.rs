//! Pipeline execution.
//!
//! This module provides:
//! - The [`PipelineExecutor`] and its settings
//! - The tool registry templates are executed with
//! - Usage accounting, execution results and progress notifications
//! - Preparation of pipelines before execution
//! - A caching tool wrapper

mod attempts;
mod cache;
mod executor;
mod expectations;
mod preparation;
mod progress;
mod result;
mod retry;
mod settings;
mod templating;
mod tools;
mod usage;


pub use cache::{CacheItem, CachedTool};
pub use executor::{create_executor, PipelineExecutor};
pub use expectations::{
    check_expectations, check_format, check_template_constraints, count_characters, count_lines,
    count_pages, count_paragraphs, count_sentences, count_unit, count_words,
    is_passing_expectations, CHARACTERS_PER_STANDARD_LINE, LINES_PER_STANDARD_PAGE,
};
pub use preparation::{prepare_pipeline, DefaultPreparer, PipelineCompiler, PipelinePreparer};
pub use progress::{
    CollectingProgressSink, LoggingProgressSink, ProgressSink, TaskProgress, TaskStatus,
};
pub use result::{ExecutionReport, ExecutionResult, TemplateExecution};
pub use retry::{BackoffStrategy, JitterStrategy, RetryBackoff};
pub use settings::{ExecutorSettings, DEFAULT_MAX_EXECUTION_ATTEMPTS, DEFAULT_MAX_PARALLEL_COUNT};
pub use templating::{extract_parameter_names, replace_parameters};
pub use tools::{ExecutionTool, ExecutionTools, SimpleTemplateTool, ToolResult};
pub use usage::{add_usage, UncertainNumber, Usage, UsageCounts};
