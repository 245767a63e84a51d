//! Progress notifications for running executions.
//!
//! Notifications are delivered synchronously while the execution runs. Once
//! the execution returns, its sink never hears from it again.

use crate::errors::{ErrorJson, PromptbookError};
use crate::pipeline::TemplateJson;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, Level};

/// State of a template in a running execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// The template was launched.
    Started,
    /// The template produced its value.
    Completed,
    /// The template gave up.
    Failed,
}

/// One state change of one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    /// Template name.
    pub template_name: String,
    /// Parameter the template produces.
    pub resulting_parameter_name: String,
    /// New status.
    pub status: TaskStatus,
    /// Produced value on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Cause on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorJson>,
}

impl TaskProgress {
    fn new(template: &TemplateJson, status: TaskStatus) -> Self {
        Self {
            template_name: template.name.clone(),
            resulting_parameter_name: template.resulting_parameter_name.clone(),
            status,
            value: None,
            error: None,
        }
    }

    pub(crate) fn started(template: &TemplateJson) -> Self {
        Self::new(template, TaskStatus::Started)
    }

    pub(crate) fn completed(template: &TemplateJson, value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(template, TaskStatus::Completed)
        }
    }

    pub(crate) fn failed(template: &TemplateJson, error: &PromptbookError) -> Self {
        Self {
            error: Some(error.to_json()),
            ..Self::new(template, TaskStatus::Failed)
        }
    }
}

/// Receives progress notifications.
pub trait ProgressSink: Send + Sync {
    /// Called once per state change.
    fn on_progress(&self, progress: TaskProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(TaskProgress) + Send + Sync,
{
    fn on_progress(&self, progress: TaskProgress) {
        self(progress);
    }
}

/// A sink that logs notifications with `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingProgressSink {
    level: Level,
}

impl Default for LoggingProgressSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgressSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgressSink {
    fn on_progress(&self, progress: TaskProgress) {
        if self.level == Level::DEBUG {
            debug!(
                template = %progress.template_name,
                status = ?progress.status,
                "Template {{{}}}: {:?}", progress.resulting_parameter_name, progress.status
            );
        } else {
            info!(
                template = %progress.template_name,
                status = ?progress.status,
                "Template {{{}}}: {:?}", progress.resulting_parameter_name, progress.status
            );
        }
    }
}

/// A sink that records notifications, for tests.
#[derive(Debug, Default)]
pub struct CollectingProgressSink {
    events: RwLock<Vec<TaskProgress>>,
}

impl CollectingProgressSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded notifications.
    #[must_use]
    pub fn events(&self) -> Vec<TaskProgress> {
        self.events.read().clone()
    }

    /// Returns the number of recorded notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns recorded notifications with the given status.
    #[must_use]
    pub fn with_status(&self, status: TaskStatus) -> Vec<TaskProgress> {
        self.events
            .read()
            .iter()
            .filter(|event| event.status == status)
            .cloned()
            .collect()
    }
}

impl ProgressSink for CollectingProgressSink {
    fn on_progress(&self, progress: TaskProgress) {
        self.events.write().push(progress);
    }
}

/// Forwards notifications until the execution finishes.
pub(crate) struct ProgressGate {
    sink: Option<Arc<dyn ProgressSink>>,
    finished: Mutex<bool>,
}

impl ProgressGate {
    pub(crate) fn new(sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self {
            sink,
            finished: Mutex::new(false),
        }
    }

    /// # Panics
    ///
    /// Panics if called after [`ProgressGate::finish`].
    pub(crate) fn emit(&self, progress: TaskProgress) {
        let finished = self.finished.lock();
        assert!(
            !*finished,
            "Progress for {{{}}} reported after the execution finished",
            progress.resulting_parameter_name
        );
        if let Some(sink) = &self.sink {
            sink.on_progress(progress);
        }
    }

    pub(crate) fn finish(&self) {
        *self.finished.lock() = true;
    }
}
