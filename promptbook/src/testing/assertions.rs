//! Assertions for execution results.

use crate::execution::ExecutionResult;

/// Asserts that the execution succeeded.
///
/// # Panics
///
/// Panics with the reported errors if it did not.
pub fn assert_succeeded(result: &ExecutionResult) {
    assert!(
        result.is_successful,
        "expected a successful execution, got errors: {:?}",
        result.errors
    );
    assert!(result.errors.is_empty(), "successful execution has errors: {:?}", result.errors);
}

/// Asserts that the execution failed with at least one error.
///
/// # Panics
///
/// Panics if it succeeded or reported no error.
pub fn assert_failed(result: &ExecutionResult) {
    assert!(!result.is_successful, "expected a failed execution");
    assert!(!result.errors.is_empty(), "failed execution reports no error");
}

/// Asserts that some error message contains `needle`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(result: &ExecutionResult, needle: &str) {
    assert!(
        result.errors.iter().any(|error| error.message.contains(needle)),
        "no error contains {needle:?}: {:?}",
        result.errors
    );
}

/// Asserts that some warning message contains `needle`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_warning_contains(result: &ExecutionResult, needle: &str) {
    assert!(
        result.warnings.iter().any(|warning| warning.message.contains(needle)),
        "no warning contains {needle:?}: {:?}",
        result.warnings
    );
}
