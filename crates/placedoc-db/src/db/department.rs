use placedoc_core::models::Department;
use placedoc_core::AppError;
use sqlx::{PgPool, Postgres};

#[derive(Clone)]
pub struct DepartmentRepository {
    pool: PgPool,
}

impl DepartmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All departments sorted by name
    #[tracing::instrument(skip(self), fields(db.table = "departments", db.operation = "select"))]
    pub async fn list(&self) -> Result<Vec<Department>, AppError> {
        let departments = sqlx::query_as::<Postgres, Department>(
            "SELECT name FROM departments ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list departments");
            AppError::Database(e)
        })?;

        Ok(departments)
    }

    /// Insert a department. Returns `false` if it already existed.
    #[tracing::instrument(skip(self), fields(db.table = "departments", db.operation = "insert"))]
    pub async fn insert(&self, name: &str) -> Result<bool, AppError> {
        let result = sqlx::query("INSERT INTO departments (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, department = %name, "Failed to insert department");
                AppError::Database(e)
            })?;

        let created = result.rows_affected() > 0;
        if created {
            tracing::info!(department = %name, "Department created");
        }

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "departments", db.operation = "select"))]
    pub async fn exists(&self, name: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM departments WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, department = %name, "Failed to check department");
                    AppError::Database(e)
                })?;

        Ok(exists)
    }
}
