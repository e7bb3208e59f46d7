//! Placedoc Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every Placedoc component: storage areas, submission identities, rejection records,
//! users and roles.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig, MoveConfig, StorageConfig, UploadPolicy};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{Area, Capability, Role, SubmissionIdentity};
pub use storage_types::StorageBackend;
