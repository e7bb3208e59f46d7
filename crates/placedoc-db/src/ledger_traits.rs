//! Repository trait abstractions used by the lifecycle engine
//!
//! These traits define the minimal interface the engine needs from the database,
//! allowing the engine to be tested against in-memory doubles.

use async_trait::async_trait;
use placedoc_core::models::{Department, FileRef, RejectionRecord, User};
use placedoc_core::AppError;

use crate::db::{DepartmentRepository, RejectionRepository, UserRepository};

/// Persistent record of rejection events
#[async_trait]
pub trait RejectionLedger: Send + Sync {
    /// Append an unresolved entry; fails with `DuplicateRejection` if one is open
    async fn record(&self, file: &FileRef, reason: &str) -> Result<RejectionRecord, AppError>;

    /// Resolve the newest unresolved entry for `file`; `None` if nothing matched
    async fn resolve(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError>;

    /// Snapshot of the unresolved entries owned by `roll_number`
    async fn list_unresolved(&self, roll_number: &str) -> Result<Vec<RejectionRecord>, AppError>;

    async fn find_unresolved(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn insert(&self, user: &User) -> Result<(), AppError>;
}

#[async_trait]
pub trait DepartmentDirectory: Send + Sync {
    async fn list(&self) -> Result<Vec<Department>, AppError>;

    /// Returns `false` if the department already existed
    async fn insert(&self, name: &str) -> Result<bool, AppError>;

    async fn exists(&self, name: &str) -> Result<bool, AppError>;
}

// Implementations for concrete repository types

#[async_trait]
impl RejectionLedger for RejectionRepository {
    async fn record(&self, file: &FileRef, reason: &str) -> Result<RejectionRecord, AppError> {
        RejectionRepository::record(self, file, reason).await
    }

    async fn resolve(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        RejectionRepository::resolve(self, file).await
    }

    async fn list_unresolved(&self, roll_number: &str) -> Result<Vec<RejectionRecord>, AppError> {
        RejectionRepository::list_unresolved(self, roll_number).await
    }

    async fn find_unresolved(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        RejectionRepository::find_unresolved(self, file).await
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        UserRepository::find_by_email(self, email).await
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        UserRepository::insert(self, user).await
    }
}

#[async_trait]
impl DepartmentDirectory for DepartmentRepository {
    async fn list(&self) -> Result<Vec<Department>, AppError> {
        DepartmentRepository::list(self).await
    }

    async fn insert(&self, name: &str) -> Result<bool, AppError> {
        DepartmentRepository::insert(self, name).await
    }

    async fn exists(&self, name: &str) -> Result<bool, AppError> {
        DepartmentRepository::exists(self, name).await
    }
}
