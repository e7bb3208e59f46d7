//! Input validation shared by the engine and the catalog.

use crate::error::AppError;

/// Validate one path segment (department, directory, roll number or file name).
///
/// Segments are joined with `/` into object keys, so they must not contain the
/// delimiter, must not be `.`/`..`, and must not carry surrounding whitespace.
pub fn validate_segment(kind: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("Please enter a {}", kind)));
    }
    if value.trim() != value {
        return Err(AppError::Validation(format!(
            "The {} must not start or end with whitespace",
            kind
        )));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(AppError::Validation(format!(
            "The {} must not contain path separators",
            kind
        )));
    }
    if value == "." || value == ".." {
        return Err(AppError::Validation(format!("Invalid {}: {}", kind, value)));
    }
    if value.chars().any(char::is_control) {
        return Err(AppError::Validation(format!(
            "The {} must not contain control characters",
            kind
        )));
    }
    Ok(())
}

pub fn validate_file_name(name: &str) -> Result<(), AppError> {
    validate_segment("file name", name)
}

/// A rejection must carry a reason the uploader can act on.
pub fn validate_reason(reason: &str) -> Result<(), AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation(
            "Please provide a reason for rejection.".to_string(),
        ));
    }
    Ok(())
}

/// Lowercased extension of a file name, if any
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}
