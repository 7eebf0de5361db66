use thiserror::Error;

/// Returned when a saga run is cancelled through its token.
///
/// Step error types convert from this so a cancelled run fails with the
/// caller's own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("saga cancelled")]
pub struct Cancelled;

/// A compensation that failed during rollback.
///
/// Compensation failures never replace the error that triggered the rollback;
/// they are logged and kept in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compensation failed for step '{step}' ({description}): {message}")]
pub struct CompensationError {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// Rendered message of the underlying error.
    pub message: String,
}
