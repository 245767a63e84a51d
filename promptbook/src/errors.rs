//! Error types for the promptbook engine.
//!
//! Every failure the engine can report is one of a small set of named error
//! kinds. Validation and archive code return them directly; the executor
//! folds expected failures into an [`ExecutionResult`](crate::execution::ExecutionResult)
//! as serializable [`ErrorJson`] values instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where to report errors that should never happen.
pub const BUG_REPORT_URL: &str = "https://github.com/promptbook/promptbook-rust/issues";

/// The main error type for promptbook operations.
#[derive(Debug, Error)]
pub enum PromptbookError {
    /// The pipeline is structurally or semantically invalid.
    #[error("{0}")]
    Logic(#[from] PipelineLogicError),

    /// An internal invariant was violated.
    #[error("{0}")]
    Unexpected(#[from] UnexpectedError),

    /// A unit of work failed at runtime.
    #[error("{0}")]
    Execution(#[from] PipelineExecutionError),

    /// A result did not satisfy the template expectations.
    #[error("{0}")]
    Expect(#[from] ExpectError),

    /// A pipeline was not found in a collection.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A pipeline URL is missing, misplaced or conflicting.
    #[error("{0}")]
    PipelineUrl(#[from] PipelineUrlError),

    /// A capability required by the call is not available.
    #[error("{0}")]
    EnvironmentMismatch(#[from] EnvironmentMismatchError),

    /// A file or payload could not be decoded.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PromptbookError {
    /// Returns the stable name of the error kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Logic(_) => "PipelineLogicError",
            Self::Unexpected(_) => "UnexpectedError",
            Self::Execution(_) => "PipelineExecutionError",
            Self::Expect(_) => "ExpectError",
            Self::NotFound(_) => "NotFoundError",
            Self::PipelineUrl(_) => "PipelineUrlError",
            Self::EnvironmentMismatch(_) => "EnvironmentMismatchError",
            Self::Parse(_) => "ParseError",
            Self::Io(_) => "IoError",
        }
    }

    /// Returns true if the error signals a bug rather than bad input.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Unexpected(_))
    }

    /// Converts the error into its serializable form.
    #[must_use]
    pub fn to_json(&self) -> ErrorJson {
        ErrorJson::new(self.name(), self.to_string())
    }
}

/// A plain-data rendering of an error, safe to send across a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorJson {
    /// The error kind (e.g. `PipelineExecutionError`).
    pub name: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorJson {
    /// Creates a new serialized error.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl From<&PromptbookError> for ErrorJson {
    fn from(err: &PromptbookError) -> Self {
        err.to_json()
    }
}

impl From<PromptbookError> for ErrorJson {
    fn from(err: PromptbookError) -> Self {
        err.to_json()
    }
}

/// Error raised when a pipeline is logically invalid.
///
/// The message is meant to be shown to the pipeline author verbatim.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineLogicError {
    /// The explanation.
    pub message: String,
}

impl PipelineLogicError {
    /// Creates a new logic error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when an internal invariant is violated.
#[derive(Debug, Clone, Error)]
#[error("{message}\n\nThis is probably a bug in promptbook, please report it at {BUG_REPORT_URL}")]
pub struct UnexpectedError {
    /// What went wrong.
    pub message: String,
}

impl UnexpectedError {
    /// Creates a new unexpected error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a unit of work fails at runtime.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineExecutionError {
    /// The failure description.
    pub message: String,
}

impl PipelineExecutionError {
    /// Creates a new execution error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a result does not meet the declared expectations.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExpectError {
    /// Which expectation failed.
    pub message: String,
}

impl ExpectError {
    /// Creates a new expectation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a pipeline cannot be found.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct NotFoundError {
    /// The lookup description.
    pub message: String,
}

impl NotFoundError {
    /// Creates a new not found error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised for pipeline URL problems in a collection.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineUrlError {
    /// The problem description.
    pub message: String,
}

impl PipelineUrlError {
    /// Creates a new URL error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a call needs a capability the environment lacks.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EnvironmentMismatchError {
    /// The missing capability.
    pub message: String,
}

impl EnvironmentMismatchError {
    /// Creates a new environment mismatch error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a file or payload cannot be decoded.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    /// What could not be parsed.
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PromptbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(ParseError::new(format!("Invalid JSON: {err}")))
    }
}

impl From<zip::result::ZipError> for PromptbookError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Parse(ParseError::new(format!("Invalid archive: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        let err: PromptbookError = PipelineLogicError::new("bad").into();
        assert_eq!(err.name(), "PipelineLogicError");

        let err: PromptbookError = NotFoundError::new("missing").into();
        assert_eq!(err.name(), "NotFoundError");
    }

    #[test]
    fn test_unexpected_error_mentions_bug_report() {
        let err = UnexpectedError::new("Loop limit reached");
        let message = err.to_string();

        assert!(message.starts_with("Loop limit reached"));
        assert!(message.contains(BUG_REPORT_URL));
        assert!(PromptbookError::from(err).is_unexpected());
    }

    #[test]
    fn test_error_json_roundtrip() {
        let err: PromptbookError = PipelineExecutionError::new("Parameter {thing} is required").into();
        let json = err.to_json();

        assert_eq!(json.name, "PipelineExecutionError");
        assert_eq!(json.message, "Parameter {thing} is required");

        let text = serde_json::to_string(&json).unwrap();
        let back: ErrorJson = serde_json::from_str(&text).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_serde_error_becomes_parse_error() {
        let err: PromptbookError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.name(), "ParseError");
    }
}
