//! Executor configuration.

use super::retry::RetryBackoff;
use serde::{Deserialize, Serialize};

/// Default number of attempts per template.
pub const DEFAULT_MAX_EXECUTION_ATTEMPTS: usize = 3;

/// Default number of templates running at once.
pub const DEFAULT_MAX_PARALLEL_COUNT: usize = 5;

/// Settings for a [`PipelineExecutor`](super::PipelineExecutor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorSettings {
    /// Attempts per template before it fails, jokers excluded.
    pub max_execution_attempts: usize,
    /// Templates allowed to run at the same time.
    pub max_parallel_count: usize,
    /// Log progress at info level instead of debug.
    pub is_verbose: bool,
    /// Delay between attempts.
    pub retry_backoff: RetryBackoff,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_execution_attempts: DEFAULT_MAX_EXECUTION_ATTEMPTS,
            max_parallel_count: DEFAULT_MAX_PARALLEL_COUNT,
            is_verbose: false,
            retry_backoff: RetryBackoff::default(),
        }
    }
}

impl ExecutorSettings {
    /// Creates default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempts per template.
    #[must_use]
    pub fn with_max_execution_attempts(mut self, attempts: usize) -> Self {
        self.max_execution_attempts = attempts;
        self
    }

    /// Sets the parallelism cap.
    #[must_use]
    pub fn with_max_parallel_count(mut self, count: usize) -> Self {
        self.max_parallel_count = count;
        self
    }

    /// Sets verbose logging.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.is_verbose = verbose;
        self
    }

    /// Sets the retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.retry_backoff = backoff;
        self
    }
}
