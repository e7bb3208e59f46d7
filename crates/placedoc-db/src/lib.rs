//! Placedoc Database Layer
//!
//! This crate provides the Postgres repositories behind the rejection ledger, the
//! user directory and the department list, plus pool setup and migrations.

// Module declarations
pub mod db;
pub mod ledger_traits;
pub mod setup;

// Re-exports: Repositories
pub use db::{DepartmentRepository, RejectionRepository, UserRepository};

// Re-exports: Ledger traits used by the engine
pub use ledger_traits::{DepartmentDirectory, RejectionLedger, UserDirectory};

// Re-exports: Setup
pub use setup::{connect, run_migrations};
