//! Test helpers for engine tests
//!
//! In-memory doubles of the ledger traits and a storage wrapper that injects copy,
//! status-read and delete faults. No database connection is needed.

pub mod faulty_storage;
pub mod mock_repositories;

pub use faulty_storage::{CopyFault, FaultyStorage};
pub use mock_repositories::{MockDepartmentDirectory, MockRejectionLedger, MockUserDirectory};

use crate::access::hash_password;
use placedoc_core::models::{Role, User};
use placedoc_core::MoveConfig;
use std::time::Duration;

/// Move timing short enough for tests that wait for a timeout
pub fn quick_move_config() -> MoveConfig {
    MoveConfig {
        timeout: Duration::from_millis(200),
        poll_initial: Duration::from_millis(5),
        poll_max: Duration::from_millis(20),
        backoff_factor: 2.0,
    }
}

/// A user with a real argon2 hash of `password`
pub fn test_user(email: &str, password: &str, role: Role, roll_number: &str) -> User {
    User {
        email: email.to_string(),
        password_hash: hash_password(password).unwrap(),
        role,
        name: format!("Test {}", role),
        roll_number: roll_number.to_string(),
    }
}
