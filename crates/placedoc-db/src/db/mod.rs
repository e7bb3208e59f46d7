pub mod department;
pub mod rejection;
pub mod user;

pub use department::DepartmentRepository;
pub use rejection::RejectionRepository;
pub use user::UserRepository;

/// Whether a sqlx error is a unique-constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
