//! Collections of pipelines addressed by URL.
//!
//! This module provides:
//! - The [`PipelineCollection`] trait
//! - An in-memory collection
//! - A lazily loaded collection
//! - Loading a collection from a directory of pipeline files

mod directory;
mod lazy;
mod simple;

#[cfg(test)]
mod collection_tests;

pub use directory::{create_collection_from_directory, DirectoryCollectionOptions};
pub use lazy::LazyPipelineCollection;
pub use simple::SimplePipelineCollection;

use crate::errors::PromptbookError;
use crate::pipeline::PipelineJson;
use async_trait::async_trait;

/// A set of pipelines, each under a unique URL.
#[async_trait]
pub trait PipelineCollection: Send + Sync {
    /// URLs of all pipelines in the collection.
    async fn list_pipelines(&self) -> Result<Vec<String>, PromptbookError>;

    /// The pipeline with the given URL.
    ///
    /// Returns a [`NotFoundError`](crate::errors::NotFoundError) if there is none.
    async fn get_pipeline_by_url(&self, url: &str) -> Result<PipelineJson, PromptbookError>;
}

/// Dumps all pipelines of a collection, in URL order.
///
/// # Errors
///
/// Returns the first error reported by the collection.
pub async fn collection_to_json(
    collection: &dyn PipelineCollection,
) -> Result<Vec<PipelineJson>, PromptbookError> {
    let mut pipelines = Vec::new();
    for url in collection.list_pipelines().await? {
        pipelines.push(collection.get_pipeline_by_url(&url).await?);
    }
    Ok(pipelines)
}
