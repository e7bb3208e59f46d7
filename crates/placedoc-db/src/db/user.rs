use placedoc_core::models::{Role, User};
use placedoc_core::AppError;
use sqlx::{FromRow, PgPool, Postgres};

use super::is_unique_violation;

/// Raw `users` row; `role` is stored as text
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    email: String,
    password: String,
    role: String,
    name: String,
    roll_number: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row.role.parse().map_err(|_| {
            AppError::Internal(format!("User {} has unknown role '{}'", row.email, row.role))
        })?;

        Ok(User {
            email: row.email,
            password_hash: row.password,
            role,
            name: row.name,
            roll_number: row.roll_number,
        })
    }
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<Postgres, UserRow>(
            r#"
            SELECT email, password, role, name, roll_number
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get user by email");
            AppError::Database(e)
        })?;

        row.map(User::try_from).transpose()
    }

    /// Insert a user whose password is already hashed
    #[tracing::instrument(skip(self, user), fields(db.table = "users", db.operation = "insert", email = %user.email))]
    pub async fn insert(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (email, password, role, name, roll_number)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.name)
        .bind(&user.roll_number)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return AppError::Validation(format!("User {} already exists", user.email));
            }
            tracing::error!(error = %e, "Failed to insert user");
            AppError::Database(e)
        })?;

        tracing::info!(email = %user.email, role = %user.role, "User created");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            email: "asha@example.com".to_string(),
            password: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            role: role.to_string(),
            name: "Asha".to_string(),
            roll_number: "101".to_string(),
        }
    }

    #[test]
    fn test_row_maps_role_text() {
        let user = User::try_from(row("Manager")).unwrap();
        assert_eq!(user.role, Role::Manager);
        assert_eq!(user.roll_number, "101");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_row_with_unknown_role_is_rejected() {
        let err = User::try_from(row("Superuser")).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
