//! In-memory pipeline collection.

use super::PipelineCollection;
use crate::errors::{NotFoundError, PipelineUrlError, PromptbookError};
use crate::pipeline::{is_same_pipeline, PipelineJson};
use crate::validation::validate_pipeline;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// A collection held in memory, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplePipelineCollection {
    pipelines: BTreeMap<String, PipelineJson>,
}

impl SimplePipelineCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from pipelines.
    ///
    /// # Errors
    ///
    /// Same as [`SimplePipelineCollection::insert`].
    pub fn from_pipelines(
        pipelines: impl IntoIterator<Item = PipelineJson>,
    ) -> Result<Self, PromptbookError> {
        let mut collection = Self::new();
        for pipeline in pipelines {
            collection.insert(pipeline)?;
        }
        Ok(collection)
    }

    /// Adds a pipeline.
    ///
    /// Returns `false` if a pipeline with the same URL and the same canonical
    /// content is already present; the existing one is kept.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineUrlError`] if the pipeline has no URL or another
    /// pipeline with different content already has it, and the validation
    /// error if the pipeline is invalid.
    pub fn insert(&mut self, pipeline: PipelineJson) -> Result<bool, PromptbookError> {
        let Some(url) = pipeline.pipeline_url.clone() else {
            return Err(PipelineUrlError::new(format!(
                "Pipeline \"{}\"{} has no URL and can not be part of a collection",
                pipeline.title,
                source_suffix(&pipeline)
            ))
            .into());
        };

        validate_pipeline(&pipeline)?;

        if let Some(existing) = self.pipelines.get(&url) {
            if is_same_pipeline(existing, &pipeline) {
                debug!(url = %url, "Identical pipeline already in collection");
                return Ok(false);
            }

            return Err(PipelineUrlError::new(format!(
                "Pipeline with URL \"{url}\" is already in the collection\n\n\
                 Conflicting files:\n- {}\n- {}\n\n\
                 Each pipeline needs a unique URL",
                source_name(existing),
                source_name(&pipeline)
            ))
            .into());
        }

        self.pipelines.insert(url, pipeline);
        Ok(true)
    }

    /// Number of pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// URLs in sorted order.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.pipelines.keys().cloned().collect()
    }

    /// The pipeline with the given URL, if present.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&PipelineJson> {
        self.pipelines.get(url)
    }

    /// Looks up a pipeline, failing with [`NotFoundError`].
    ///
    /// # Errors
    ///
    /// Returns a [`NotFoundError`] listing the available URLs.
    pub fn require(&self, url: &str) -> Result<&PipelineJson, PromptbookError> {
        self.pipelines.get(url).ok_or_else(|| {
            let available: Vec<String> = self.pipelines.keys().map(|url| format!("- {url}")).collect();
            let available = if available.is_empty() {
                "(the collection is empty)".to_string()
            } else {
                available.join("\n")
            };
            NotFoundError::new(format!(
                "Pipeline with URL \"{url}\" not found\n\nAvailable pipelines:\n{available}"
            ))
            .into()
        })
    }

    /// All pipelines in URL order.
    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineJson> {
        self.pipelines.values()
    }
}

fn source_name(pipeline: &PipelineJson) -> &str {
    pipeline.source_file.as_deref().unwrap_or("(unknown source)")
}

fn source_suffix(pipeline: &PipelineJson) -> String {
    pipeline
        .source_file
        .as_ref()
        .map(|file| format!(" from {file}"))
        .unwrap_or_default()
}

#[async_trait]
impl PipelineCollection for SimplePipelineCollection {
    async fn list_pipelines(&self) -> Result<Vec<String>, PromptbookError> {
        Ok(self.urls())
    }

    async fn get_pipeline_by_url(&self, url: &str) -> Result<PipelineJson, PromptbookError> {
        self.require(url).cloned()
    }
}
