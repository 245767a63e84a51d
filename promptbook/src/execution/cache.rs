//! Caching wrapper around an execution tool.

use super::expectations::check_template_constraints;
use super::tools::{ExecutionTool, ToolResult};
use super::usage::Usage;
use crate::errors::PromptbookError;
use crate::pipeline::{BlockType, Parameters, TemplateJson, PROMPTBOOK_VERSION};
use crate::storage::PromptbookStorage;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

/// Parameters that change on every run and would defeat the cache.
const VOLATILE_PARAMETERS: [&str; 1] = ["currentDate"];

/// A cached tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheItem {
    /// When the value was produced (RFC 3339).
    pub date: String,
    /// Engine version that produced the value.
    pub promptbook_version: String,
    /// Block type of the template.
    pub block_type: BlockType,
    /// Name of the template.
    pub template_name: String,
    /// Parameters the tool was called with.
    pub parameters: Parameters,
    /// Produced value.
    pub value: String,
    /// Usage of the original call.
    pub usage: Usage,
}

/// Wraps a tool so identical calls are answered from a storage.
///
/// Only results that satisfy the template constraints are stored. A cache
/// hit costs nothing and reports zero usage.
pub struct CachedTool {
    inner: Arc<dyn ExecutionTool>,
    storage: Arc<dyn PromptbookStorage<CacheItem>>,
}

impl std::fmt::Debug for CachedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedTool").finish_non_exhaustive()
    }
}

impl CachedTool {
    /// Wraps `inner` with `storage`.
    #[must_use]
    pub fn new(inner: Arc<dyn ExecutionTool>, storage: Arc<dyn PromptbookStorage<CacheItem>>) -> Self {
        Self { inner, storage }
    }

    /// Storage key of a call.
    #[must_use]
    pub fn cache_key(template: &TemplateJson, parameters: &Parameters) -> String {
        let stable: Parameters = parameters
            .iter()
            .filter(|(name, _)| !VOLATILE_PARAMETERS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(template.block_type.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(template.content.as_bytes());
        hasher.update(b"\n");
        if let Some(requirements) = &template.model_requirements {
            hasher.update(serde_json::to_string(requirements).unwrap_or_default().as_bytes());
        }
        hasher.update(b"\n");
        hasher.update(serde_json::to_string(&stable).unwrap_or_default().as_bytes());

        format!(
            "{}-{}",
            template.block_type.as_str().to_lowercase(),
            hex::encode(hasher.finalize())
        )
    }
}

#[async_trait]
impl ExecutionTool for CachedTool {
    async fn execute(
        &self,
        template: &TemplateJson,
        parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        let key = Self::cache_key(template, parameters);

        if let Some(item) = self.storage.get_item(&key).await? {
            debug!(template = %template.name, key = %key, "Cache hit");
            return Ok(ToolResult::free(item.value));
        }

        let result = self.inner.execute(template, parameters).await?;

        if check_template_constraints(template, &result.value).is_ok() {
            let item = CacheItem {
                date: Utc::now().to_rfc3339(),
                promptbook_version: PROMPTBOOK_VERSION.to_string(),
                block_type: template.block_type,
                template_name: template.name.clone(),
                parameters: parameters.clone(),
                value: result.value.clone(),
                usage: result.usage,
            };
            self.storage.set_item(&key, item).await?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::tools::MockExecutionTool;
    use crate::execution::usage::UncertainNumber;
    use crate::pipeline::ExpectationUnit;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    fn priced(value: &str) -> ToolResult {
        ToolResult::new(value, Usage::zero().with_price(UncertainNumber::exact(0.01)))
    }

    fn params(date: &str) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert("thing".into(), "a cat".into());
        parameters.insert("currentDate".into(), date.into());
        parameters
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let mut inner = MockExecutionTool::new();
        inner.expect_execute().times(1).returning(|_, _| Ok(priced("meow")));

        let storage = Arc::new(MemoryStorage::<CacheItem>::new());
        let tool = CachedTool::new(Arc::new(inner), storage.clone());
        let template = TemplateJson::prompt("sound", "What does {thing} say?").with_dependency("thing");

        let first = tool.execute(&template, &params("2024-01-01")).await.unwrap();
        let second = tool.execute(&template, &params("2024-02-02")).await.unwrap();

        assert_eq!(first.value, "meow");
        assert_eq!(second.value, "meow");
        assert_eq!(first.usage.price.value, 0.01);
        assert!(second.usage.is_zero());
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_results_are_not_cached() {
        let mut inner = MockExecutionTool::new();
        inner.expect_execute().times(2).returning(|_, _| Ok(priced("short")));

        let storage = Arc::new(MemoryStorage::<CacheItem>::new());
        let tool = CachedTool::new(Arc::new(inner), storage.clone());
        let template = TemplateJson::simple("x", "").with_expectation(ExpectationUnit::Words, Some(5), None);

        tool.execute(&template, &Parameters::new()).await.unwrap();
        tool.execute(&template, &Parameters::new()).await.unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_key_depends_on_content_and_parameters() {
        let template = TemplateJson::simple("x", "{thing}");
        let key = CachedTool::cache_key(&template, &params("2024-01-01"));

        assert!(key.starts_with("simple-"));
        assert_eq!(key, CachedTool::cache_key(&template, &params("2030-12-31")));

        let mut other = params("2024-01-01");
        other.insert("thing".into(), "a dog".into());
        assert_ne!(key, CachedTool::cache_key(&template, &other));
        assert_ne!(key, CachedTool::cache_key(&TemplateJson::simple("x", "{other}"), &params("2024-01-01")));
    }
}
