//! Placedoc Engine
//!
//! This crate hosts the File Lifecycle Engine and everything that calls into it:
//! the catalog over storage keys, authentication and role checks, zip bundles and
//! the request-scoped [`PlacementService`] facade used by front ends.

pub mod access;
pub mod bundle;
pub mod catalog;
pub mod lifecycle;
pub mod service;

// Test helpers (in-memory doubles and fault injection)
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use access::{hash_password, verify_password, Authenticator, RequestContext};
pub use bundle::bundle_zip;
pub use catalog::Catalog;
pub use lifecycle::{
    Ack, InFlightMoves, KeyLocks, LifecycleEngine, MoveControl, MoveProgress, MoveState, Mover,
};
pub use service::PlacementService;
