//! Collection loaded on first use.

use super::{PipelineCollection, SimplePipelineCollection};
use crate::errors::PromptbookError;
use crate::pipeline::PipelineJson;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type PipelineSource =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<PipelineJson>, PromptbookError>> + Send + Sync>;

/// A collection whose pipelines come from an async source.
///
/// The source runs once, on the first query. If it fails, the error is
/// returned and the next query tries again.
pub struct LazyPipelineCollection {
    source: PipelineSource,
    loaded: OnceCell<SimplePipelineCollection>,
}

impl std::fmt::Debug for LazyPipelineCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPipelineCollection")
            .field("is_loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

impl LazyPipelineCollection {
    /// Creates a collection backed by `source`.
    pub fn from_source<F, Fut>(source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<PipelineJson>, PromptbookError>> + Send + 'static,
    {
        Self {
            source: Arc::new(move || source().boxed()),
            loaded: OnceCell::new(),
        }
    }

    /// Returns true once the source has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Loads the source if needed and returns the collection.
    ///
    /// # Errors
    ///
    /// Returns the error of the source or of building the collection.
    pub async fn load(&self) -> Result<&SimplePipelineCollection, PromptbookError> {
        self.loaded
            .get_or_try_init(|| async {
                let pipelines = (self.source)().await?;
                SimplePipelineCollection::from_pipelines(pipelines)
            })
            .await
    }
}

#[async_trait]
impl PipelineCollection for LazyPipelineCollection {
    async fn list_pipelines(&self) -> Result<Vec<String>, PromptbookError> {
        Ok(self.load().await?.urls())
    }

    async fn get_pipeline_by_url(&self, url: &str) -> Result<PipelineJson, PromptbookError> {
        self.load().await?.require(url).cloned()
    }
}
