//! Deterministic execution tools for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::{PipelineExecutionError, PromptbookError};
use crate::execution::{replace_parameters, ExecutionTool, ToolResult, UncertainNumber, Usage};
use crate::pipeline::{Parameters, TemplateJson};

/// Answers every template with its own content, parameters substituted.
///
/// Usage is measured from the text; each call may carry a fixed price.
#[derive(Debug, Default)]
pub struct EchoTool {
    price: f64,
    calls: Mutex<Vec<Parameters>>,
}

impl EchoTool {
    /// Creates a free echo tool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges `price` per call.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Parameters of every call, in call order.
    #[must_use]
    pub fn recorded_parameters(&self) -> Vec<Parameters> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ExecutionTool for EchoTool {
    async fn execute(
        &self,
        template: &TemplateJson,
        parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        self.calls.lock().push(parameters.clone());
        let text = replace_parameters(&template.content, parameters)?;
        let usage = Usage::from_texts(&text, &text).with_price(UncertainNumber::exact(self.price));
        Ok(ToolResult::new(text, usage))
    }
}

/// Fails every call with a [`PipelineExecutionError`].
#[derive(Debug)]
pub struct FailingTool {
    message: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl FailingTool {
    /// Creates a tool failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Waits `delay` before failing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionTool for FailingTool {
    async fn execute(
        &self,
        _template: &TemplateJson,
        _parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Err(PipelineExecutionError::new(self.message.clone()).into())
    }
}

/// Returns `bad` for the first `failures` calls and `good` afterwards.
#[derive(Debug)]
pub struct FlakyTool {
    failures: usize,
    bad: String,
    good: String,
    calls: AtomicUsize,
}

impl FlakyTool {
    /// Creates a flaky tool.
    #[must_use]
    pub fn new(failures: usize, bad: impl Into<String>, good: impl Into<String>) -> Self {
        Self {
            failures,
            bad: bad.into(),
            good: good.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionTool for FlakyTool {
    async fn execute(
        &self,
        _template: &TemplateJson,
        _parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let value = if call < self.failures { &self.bad } else { &self.good };
        Ok(ToolResult::free(value.clone()))
    }
}

/// Echoes after a delay and records how many calls overlapped.
#[derive(Debug)]
pub struct ConcurrencyProbeTool {
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl ConcurrencyProbeTool {
    /// Creates a probe whose calls take `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Highest number of calls running at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of calls that ran to completion.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionTool for ConcurrencyProbeTool {
    async fn execute(
        &self,
        template: &TemplateJson,
        parameters: &Parameters,
    ) -> Result<ToolResult, PromptbookError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        replace_parameters(&template.content, parameters).map(ToolResult::free)
    }
}
