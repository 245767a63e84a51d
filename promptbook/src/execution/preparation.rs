//! Pipeline preparation and compilation seams.
//!
//! Preparation turns a pipeline's knowledge sources into knowledge pieces
//! and stamps a [`PreparationRecord`]. A prepared pipeline is a plain value
//! that can be saved and reused; executing an unprepared one prepares it on
//! the fly.

use super::tools::ExecutionTools;
use super::usage::Usage;
use crate::errors::PromptbookError;
use crate::pipeline::{
    is_pipeline_prepared, KnowledgePiece, PipelineJson, PreparationRecord, PROMPTBOOK_VERSION,
};
use crate::validation::validated;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};
use uuid::Uuid;

#[allow(clippy::expect_used)]
static SOURCE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://\S+|[^\s]+\.[A-Za-z0-9]{1,5})$").expect("static regex")
});

/// Produces the prepared form of a pipeline.
#[async_trait]
pub trait PipelinePreparer: Send + Sync {
    /// Returns a prepared copy of the pipeline.
    async fn prepare(&self, pipeline: &PipelineJson) -> Result<PipelineJson, PromptbookError>;
}

/// Compiles pipeline source text (`.book.md`) into a pipeline.
#[async_trait]
pub trait PipelineCompiler: Send + Sync {
    /// Compiles `source`, read from `source_file`.
    async fn compile(&self, source: &str, source_file: &str) -> Result<PipelineJson, PromptbookError>;
}

/// Preparer that turns inline knowledge sources into knowledge pieces.
///
/// Sources that reference a URL or a file are skipped with a warning; fetching
/// them needs a scraper-backed preparer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPreparer;

#[async_trait]
impl PipelinePreparer for DefaultPreparer {
    async fn prepare(&self, pipeline: &PipelineJson) -> Result<PipelineJson, PromptbookError> {
        if is_pipeline_prepared(pipeline) {
            return Ok(pipeline.clone());
        }

        let mut prepared = pipeline.clone();
        prepared.knowledge_pieces = pipeline
            .knowledge_sources
            .iter()
            .filter_map(|source| {
                let content = source.source_content.trim();
                if is_source_reference(content) {
                    warn!(
                        pipeline = %pipeline.display_name(),
                        source = %source.name,
                        "Knowledge source {} is a reference and was not fetched", source.name
                    );
                    return None;
                }
                Some(KnowledgePiece {
                    name: source.name.clone(),
                    content: content.to_string(),
                    sources: vec![source.name.clone()],
                })
            })
            .collect();

        prepared.preparations.push(PreparationRecord {
            id: Uuid::new_v4().to_string(),
            promptbook_version: PROMPTBOOK_VERSION.to_string(),
            usage: Usage::zero(),
        });

        debug!(
            pipeline = %pipeline.display_name(),
            knowledge_pieces = prepared.knowledge_pieces.len(),
            "Pipeline prepared"
        );
        Ok(prepared)
    }
}

fn is_source_reference(content: &str) -> bool {
    SOURCE_REFERENCE.is_match(content)
}

/// Prepares a pipeline with the preparer of `tools` and validates the result.
///
/// # Errors
///
/// Returns whatever the preparer or the validator reports.
pub async fn prepare_pipeline(
    pipeline: &PipelineJson,
    tools: &ExecutionTools,
) -> Result<PipelineJson, PromptbookError> {
    let prepared = tools.preparer().prepare(pipeline).await?;
    validated(prepared)
}
