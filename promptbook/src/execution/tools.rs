//! Execution tools: the capabilities a pipeline runs on.
//!
//! Every block type is carried out by an [`ExecutionTool`] registered in
//! [`ExecutionTools`]. The registry also holds the preparer and, optionally,
//! the compiler for pipeline sources. It is passed explicitly to whatever
//! needs it; nothing here is global.

use super::preparation::{DefaultPreparer, PipelineCompiler, PipelinePreparer};
use super::templating::replace_parameters;
use super::usage::Usage;
use crate::errors::{EnvironmentMismatchError, PromptbookError};
use crate::pipeline::{BlockType, Parameters, TemplateJson};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Value produced by one attempt of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Candidate value for the resulting parameter.
    pub value: String,
    /// Cost of the attempt.
    pub usage: Usage,
}

impl ToolResult {
    /// Creates a result.
    #[must_use]
    pub fn new(value: impl Into<String>, usage: Usage) -> Self {
        Self {
            value: value.into(),
            usage,
        }
    }

    /// Creates a result at no cost.
    #[must_use]
    pub fn free(value: impl Into<String>) -> Self {
        Self::new(value, Usage::zero())
    }
}

/// Carries out templates of one block type.
///
/// `parameters` holds exactly the template dependencies plus the reserved
/// parameters. Errors other than [`PromptbookError::Unexpected`] are treated
/// as a failed attempt and retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionTool: Send + Sync {
    /// Runs one attempt.
    async fn execute(
        &self,
        template: &TemplateJson,
        parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError>;
}

/// Tool for `SIMPLE` templates: substitutes parameters into the content.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTemplateTool;

#[async_trait]
impl ExecutionTool for SimpleTemplateTool {
    async fn execute(
        &self,
        template: &TemplateJson,
        parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        replace_parameters(&template.content, parameters).map(ToolResult::free)
    }
}

/// Registry of tools, keyed by block type.
#[derive(Clone)]
pub struct ExecutionTools {
    tools: HashMap<BlockType, Arc<dyn ExecutionTool>>,
    preparer: Arc<dyn PipelinePreparer>,
    compiler: Option<Arc<dyn PipelineCompiler>>,
}

impl Default for ExecutionTools {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionTools")
            .field("block_types", &self.block_types())
            .field("has_compiler", &self.compiler.is_some())
            .finish_non_exhaustive()
    }
}

impl ExecutionTools {
    /// Creates a registry with the built-in `SIMPLE` tool and the default preparer.
    #[must_use]
    pub fn new() -> Self {
        let mut tools: HashMap<BlockType, Arc<dyn ExecutionTool>> = HashMap::new();
        tools.insert(BlockType::Simple, Arc::new(SimpleTemplateTool));
        Self {
            tools,
            preparer: Arc::new(DefaultPreparer),
            compiler: None,
        }
    }

    /// Registers the tool for a block type, replacing any previous one.
    #[must_use]
    pub fn with_tool(mut self, block_type: BlockType, tool: Arc<dyn ExecutionTool>) -> Self {
        self.register(block_type, tool);
        self
    }

    /// Registers the tool for a block type, replacing any previous one.
    pub fn register(&mut self, block_type: BlockType, tool: Arc<dyn ExecutionTool>) {
        self.tools.insert(block_type, tool);
    }

    /// Sets the preparer.
    #[must_use]
    pub fn with_preparer(mut self, preparer: Arc<dyn PipelinePreparer>) -> Self {
        self.preparer = preparer;
        self
    }

    /// Sets the compiler for pipeline sources.
    #[must_use]
    pub fn with_compiler(mut self, compiler: Arc<dyn PipelineCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Looks up the tool for a block type.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvironmentMismatchError`] if no tool is registered.
    pub fn tool_for(&self, block_type: BlockType) -> Result<Arc<dyn ExecutionTool>, PromptbookError> {
        self.tools.get(&block_type).cloned().ok_or_else(|| {
            EnvironmentMismatchError::new(format!(
                "No execution tool is available for {block_type} templates"
            ))
            .into()
        })
    }

    /// Returns true if a tool is registered for the block type.
    #[must_use]
    pub fn supports(&self, block_type: BlockType) -> bool {
        self.tools.contains_key(&block_type)
    }

    /// Block types with a registered tool, sorted.
    #[must_use]
    pub fn block_types(&self) -> Vec<BlockType> {
        let mut types: Vec<BlockType> = self.tools.keys().copied().collect();
        types.sort_by_key(|block_type| block_type.as_str());
        types
    }

    /// The preparer.
    #[must_use]
    pub fn preparer(&self) -> &Arc<dyn PipelinePreparer> {
        &self.preparer
    }

    /// The compiler, if one was provided.
    #[must_use]
    pub fn compiler(&self) -> Option<&Arc<dyn PipelineCompiler>> {
        self.compiler.as_ref()
    }
}
