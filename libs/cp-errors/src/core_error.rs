//! The shared error taxonomy every control-plane component reports through.

use crate::catalog;
use crate::problem::{Problem, ValidationViolation};

/// Error taxonomy shared by the authoritative store, the reconcilers and the orchestrator.
///
/// Every component returns this type (or wraps it) rather than inventing its own error enum,
/// so the HTTP edge has exactly one place that maps errors onto [`Problem`] responses.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }

    pub fn backend(what: impl Into<String>) -> Self {
        Self::Backend(what.into())
    }
}

impl From<&CoreError> for Problem {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::Validation { field, message } => catalog::VALIDATION
                .as_problem(message.clone())
                .with_errors(vec![ValidationViolation {
                    field: field.clone(),
                    message: message.clone(),
                    code: None,
                }]),
            CoreError::NotFound(what) => catalog::NOT_FOUND.as_problem(format!("{what} not found")),
            CoreError::QuotaExceeded(detail) => catalog::QUOTA_EXCEEDED.as_problem(detail.clone()),
            CoreError::Conflict(detail) => catalog::CONFLICT.as_problem(detail.clone()),
            CoreError::Backend(detail) => {
                tracing::error!(error = %detail, "backend reconciliation error");
                catalog::BACKEND_ERROR.as_problem(detail.clone())
            }
            CoreError::Internal(cause) => {
                tracing::error!(error = ?cause, "internal error");
                catalog::INTERNAL.as_problem("an internal error occurred")
            }
        }
    }
}

impl From<CoreError> for Problem {
    fn from(err: CoreError) -> Self {
        Problem::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn validation_error_carries_field_violation() {
        let err = CoreError::validation("name", "must not be empty");
        let problem: Problem = err.into();
        assert_eq!(problem.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(problem.errors.unwrap()[0].field, "name");
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = CoreError::not_found("container claim");
        let problem: Problem = err.into();
        assert_eq!(problem.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn quota_exceeded_maps_to_409_conflict() {
        let err = CoreError::QuotaExceeded("cpu over fair share".into());
        let problem: Problem = err.into();
        assert_eq!(problem.status, StatusCode::CONFLICT);
        assert_eq!(problem.code, "QUOTA_EXCEEDED");
    }
}
