//! Error types module
//!
//! Every engine, catalog and ledger operation reports failure through [`AppError`].
//! The presentation layer renders each error as a per-item banner using the
//! [`ErrorMetadata`] trait, so a batch of selected files can partially succeed.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a slow copy
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to a user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether the caller may retry the same operation
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message (may differ from the internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Move of {key} did not complete within {waited_ms} ms")]
    MoveTimeout { key: String, waited_ms: u64 },

    #[error("Move of {key} failed: {reason}")]
    MoveFailed { key: String, reason: String },

    #[error("Move of {0} was cancelled")]
    MoveCancelled(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    #[error("An unresolved rejection already exists for {key}")]
    DuplicateRejection { key: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Reconciliation required: {0}")]
    ReconciliationRequired(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AppError::Database(_) => (
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::Validation(_) => (
            "VALIDATION_ERROR",
            false,
            Some("Fill in every required field and try again"),
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            "NOT_FOUND",
            false,
            Some("Refresh the file list; the file may have been moved already"),
            LogLevel::Debug,
        ),
        AppError::MoveTimeout { .. } => (
            "MOVE_TIMEOUT",
            true,
            Some("The file is still in its original location; retry the move"),
            LogLevel::Warn,
        ),
        AppError::MoveFailed { .. } => (
            "MOVE_FAILED",
            true,
            Some("The file is still in its original location; retry the move"),
            LogLevel::Error,
        ),
        AppError::MoveCancelled(_) => (
            "MOVE_CANCELLED",
            true,
            None,
            LogLevel::Debug,
        ),
        AppError::StorageWrite(_) => (
            "STORAGE_WRITE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::StorageRead(_) => (
            "STORAGE_READ_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::DuplicateRejection { .. } => (
            "DUPLICATE_REJECTION",
            false,
            Some("Wait for the owner to re-upload the file"),
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            "UNAUTHORIZED",
            false,
            Some("Check your email and password"),
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            "FORBIDDEN",
            false,
            Some("Ask an administrator for the required role"),
            LogLevel::Debug,
        ),
        AppError::ReconciliationRequired(_) => (
            "RECONCILIATION_REQUIRED",
            false,
            Some("Contact an administrator; the file needs manual cleanup"),
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Validation(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => format!("{} not found", msg),
            AppError::MoveTimeout { key, .. } => format!("Moving {} took too long", key),
            AppError::MoveFailed { key, .. } => format!("Moving {} failed", key),
            AppError::MoveCancelled(ref key) => format!("Moving {} was cancelled", key),
            AppError::StorageWrite(_) => "Failed to write to storage".to_string(),
            AppError::StorageRead(_) => "Failed to read from storage".to_string(),
            AppError::DuplicateRejection { key } => {
                format!("{} already has an open rejection", key)
            }
            AppError::Unauthorized(_) => {
                "Incorrect username or password. Please try again.".to_string()
            }
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::ReconciliationRequired(_) => {
                "The file was copied but could not be removed from its original location"
                    .to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
        }
    }
}
