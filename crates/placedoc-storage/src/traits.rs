//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use placedoc_core::{AppError, Area, StorageBackend};
use thiserror::Error;
use uuid::Uuid;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            StorageError::InvalidKey(msg) => AppError::Validation(msg),
            StorageError::UploadFailed(_)
            | StorageError::DeleteFailed(_)
            | StorageError::CopyFailed(_) => AppError::StorageWrite(err.to_string()),
            StorageError::DownloadFailed(_)
            | StorageError::BackendError(_)
            | StorageError::IoError(_) => AppError::StorageRead(err.to_string()),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
        }
    }
}

/// Identifier of a server-side copy, returned by [`Storage::start_copy`]
pub type CopyId = Uuid;

/// Status of a server-side copy as reported on the destination object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyState {
    Pending,
    Success,
    Failed(String),
    Aborted,
}

/// Properties of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectProperties {
    pub key: String,
    /// `None` while a copy into this key has not written any data yet
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Last copy that targeted this key, if it has not been superseded by a write
    pub copy: Option<(CopyId, CopyState)>,
}

/// Stream of object content chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Storage abstraction trait
///
/// Every operation addresses an object by its [`Area`] and its key relative to the
/// area's container root (see the crate documentation for the key layout).
///
/// Only single-object writes are atomic. There is no rename: moving an object
/// between areas is a server-side copy, observed through [`Storage::properties`],
/// followed by a delete of the source.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write an object, replacing any existing object at the key
    async fn put(&self, area: Area, key: &str, data: Bytes) -> StorageResult<()>;

    /// Read a whole object
    async fn get(&self, area: Area, key: &str) -> StorageResult<Bytes>;

    /// Read an object as a stream of chunks (for large files)
    async fn get_stream(&self, area: Area, key: &str) -> StorageResult<ByteStream>;

    /// List every key under `prefix`, which must be empty or end in `/`
    async fn list(&self, area: Area, prefix: &str) -> StorageResult<Vec<String>>;

    /// Object properties, including the state of a copy targeting this key.
    ///
    /// Returns `NotFound` only when there is neither an object nor a copy record.
    async fn properties(&self, area: Area, key: &str) -> StorageResult<ObjectProperties>;

    /// Check if an object exists
    async fn exists(&self, area: Area, key: &str) -> StorageResult<bool>;

    /// Start an asynchronous copy of `from_area/key` to `to_area/key`.
    ///
    /// Fails with `NotFound` if the source is absent at invocation time. Progress is
    /// observed by polling [`Storage::properties`] on the destination.
    async fn start_copy(&self, from_area: Area, to_area: Area, key: &str)
        -> StorageResult<CopyId>;

    /// Abort an unfinished copy and remove whatever the copy wrote at the destination
    async fn abort_copy(&self, to_area: Area, key: &str) -> StorageResult<()>;

    /// Forget the finished copy that targeted `to_area/key`.
    ///
    /// Called once the copy has been confirmed; a copy still pending is left alone.
    async fn finish_copy(&self, to_area: Area, key: &str) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, area: Area, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
