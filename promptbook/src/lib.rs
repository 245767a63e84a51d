//! # Promptbook
//!
//! A pipeline engine for prompt workflows.
//!
//! A pipeline is a JSON document declaring parameters and templates. Each
//! template produces one parameter from the parameters it depends on. The
//! engine provides:
//!
//! - **Validation**: structural and dependency checks before anything runs
//! - **Execution**: dependency-ordered, bounded-parallel template execution
//!   with retries, jokers, expectations and usage accounting
//! - **Collections**: pipelines addressed by URL, loaded from memory,
//!   directories or archives
//! - **Archives**: `.bookc` bundles of compiled pipelines
//! - **Caching**: pluggable key-value storage for memoized tool results
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use promptbook::prelude::*;
//!
//! let tools = ExecutionTools::new().with_tool(BlockType::Prompt, Arc::new(MyLlmTool));
//! let executor = create_executor(pipeline, tools, ExecutorSettings::default())?;
//!
//! let result = executor.execute(&inputs(&[("thing", "a cat")]), None).await;
//! assert!(result.is_successful);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod archive;
pub mod collection;
pub mod errors;
pub mod execution;
pub mod observability;
pub mod pipeline;
pub mod storage;
pub mod testing;
pub mod validation;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archive::{decode_archive, encode_archive, load_archive, save_archive};
    pub use crate::collection::{
        collection_to_json, create_collection_from_directory, DirectoryCollectionOptions,
        LazyPipelineCollection, PipelineCollection, SimplePipelineCollection,
    };
    pub use crate::errors::{ErrorJson, PromptbookError};
    pub use crate::execution::{
        create_executor, prepare_pipeline, CachedTool, ExecutionResult, ExecutionTool,
        ExecutionTools, ExecutorSettings, PipelineCompiler, PipelineExecutor, PipelinePreparer,
        ProgressSink, TaskProgress, TaskStatus, ToolResult, Usage,
    };
    pub use crate::pipeline::{
        pipeline_from_json_str, BlockType, ParameterJson, Parameters, PipelineJson, TemplateJson,
    };
    pub use crate::storage::{FileCacheStorage, MemoryStorage, PromptbookStorage};
    pub use crate::testing::inputs;
    pub use crate::validation::validate_pipeline;
}
