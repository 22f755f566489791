//! Error types for the Contoso registrar

use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
///
/// Version conflicts and concurrent deletes are not errors: the conditional
/// write layer reports them as outcomes so callers can recover locally.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("Validation rejected: {}", summarize(.0))]
    ValidationRejected(Vec<ValidationIssue>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures below the conditional-write layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// A constraint in the store refused the submitted values
    #[error("Rejected by store: {}", summarize(.0))]
    Rejected(Vec<ValidationIssue>),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(issues) => AppError::ValidationRejected(issues),
            other => AppError::StorageUnavailable(other),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageUnavailable(StoreError::Database(err))
    }
}

/// A single rejected field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.field, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// Message safe to show to an end user
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(_) => "The requested record no longer exists.".to_string(),
            AppError::StorageUnavailable(e) => {
                tracing::error!("Storage error: {}", e);
                "The service is temporarily unavailable. Please try again later.".to_string()
            }
            AppError::ValidationRejected(issues) => summarize(issues),
            AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!("Internal error: {}", self);
                "An internal error occurred".to_string()
            }
        }
    }

    /// Whether the caller may retry the same request after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(StoreError::Database(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failure_hides_details() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        let message = err.user_message();
        assert!(message.contains("try again later"));
        assert!(!message.contains("pool"));
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = AppError::ValidationRejected(vec![
            ValidationIssue::new("Name", "must be between 3 and 50 characters"),
            ValidationIssue::new("Budget", "must not be negative"),
        ]);
        assert!(!err.is_transient());
        assert_eq!(
            err.user_message(),
            "Name: must be between 3 and 50 characters; Budget: must not be negative"
        );
    }

    #[test]
    fn test_store_rejection_becomes_validation() {
        let err = AppError::from(StoreError::Rejected(vec![ValidationIssue::new(
            "InstructorID",
            "does not refer to an existing instructor",
        )]));
        assert!(!err.is_transient());
        assert!(matches!(&err, AppError::ValidationRejected(issues) if issues[0].field == "InstructorID"));
    }

    #[test]
    fn test_corrupt_value_is_not_transient() {
        let err = AppError::from(StoreError::Corrupt("row_version has 3 bytes".to_string()));
        assert!(!err.is_transient());
    }
}
