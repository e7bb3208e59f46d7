use placedoc_core::models::{FileRef, RejectionRecord};
use placedoc_core::AppError;
use sqlx::{PgPool, Postgres};

use super::is_unique_violation;

/// Rejection ledger backed by the `rejection_logs` table.
///
/// The partial unique index on unresolved rows keeps at most one open rejection per
/// file, even when two managers reject concurrently from different processes.
#[derive(Clone)]
pub struct RejectionRepository {
    pool: PgPool,
}

impl RejectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an unresolved rejection for `file`
    #[tracing::instrument(skip(self, reason), fields(db.table = "rejection_logs", db.operation = "insert"))]
    pub async fn record(&self, file: &FileRef, reason: &str) -> Result<RejectionRecord, AppError> {
        let record = sqlx::query_as::<Postgres, RejectionRecord>(
            r#"
            INSERT INTO rejection_logs (department, directory, roll_number, file_name, reason)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, department, directory, roll_number, file_name, reason,
                      resolved, created_at, resolved_at
            "#,
        )
        .bind(&file.identity.department)
        .bind(&file.identity.directory)
        .bind(&file.identity.roll_number)
        .bind(&file.file_name)
        .bind(reason)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::DuplicateRejection { key: file.path() };
            }
            tracing::error!(error = %e, key = %file.path(), "Failed to record rejection");
            AppError::Database(e)
        })?;

        tracing::info!(
            rejection_id = record.id,
            key = %file.path(),
            "Rejection recorded"
        );

        Ok(record)
    }

    /// Mark the newest unresolved rejection of `file` resolved.
    ///
    /// Returns `None` when nothing was open, so a second re-upload is a no-op.
    #[tracing::instrument(skip(self), fields(db.table = "rejection_logs", db.operation = "update"))]
    pub async fn resolve(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, RejectionRecord>(
            r#"
            UPDATE rejection_logs
            SET resolved = TRUE, resolved_at = NOW()
            WHERE id = (
                SELECT id FROM rejection_logs
                WHERE department = $1 AND directory = $2 AND roll_number = $3
                  AND file_name = $4 AND NOT resolved
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, department, directory, roll_number, file_name, reason,
                      resolved, created_at, resolved_at
            "#,
        )
        .bind(&file.identity.department)
        .bind(&file.identity.directory)
        .bind(&file.identity.roll_number)
        .bind(&file.file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %file.path(), "Failed to resolve rejection");
            AppError::Database(e)
        })?;

        if let Some(ref record) = record {
            tracing::info!(
                rejection_id = record.id,
                key = %file.path(),
                "Rejection resolved"
            );
        }

        Ok(record)
    }

    /// Unresolved rejections owned by `roll_number`, newest first
    #[tracing::instrument(skip(self), fields(db.table = "rejection_logs", db.operation = "select"))]
    pub async fn list_unresolved(&self, roll_number: &str) -> Result<Vec<RejectionRecord>, AppError> {
        let records = sqlx::query_as::<Postgres, RejectionRecord>(
            r#"
            SELECT id, department, directory, roll_number, file_name, reason,
                   resolved, created_at, resolved_at
            FROM rejection_logs
            WHERE roll_number = $1 AND NOT resolved
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(roll_number)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, roll_number = %roll_number, "Failed to list rejections");
            AppError::Database(e)
        })?;

        Ok(records)
    }

    /// The open rejection of `file`, if any
    #[tracing::instrument(skip(self), fields(db.table = "rejection_logs", db.operation = "select"))]
    pub async fn find_unresolved(&self, file: &FileRef) -> Result<Option<RejectionRecord>, AppError> {
        let record = sqlx::query_as::<Postgres, RejectionRecord>(
            r#"
            SELECT id, department, directory, roll_number, file_name, reason,
                   resolved, created_at, resolved_at
            FROM rejection_logs
            WHERE department = $1 AND directory = $2 AND roll_number = $3
              AND file_name = $4 AND NOT resolved
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(&file.identity.department)
        .bind(&file.identity.directory)
        .bind(&file.identity.roll_number)
        .bind(&file.file_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key = %file.path(), "Failed to look up rejection");
            AppError::Database(e)
        })?;

        Ok(record)
    }
}
