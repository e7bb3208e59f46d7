//! Data models for the application
//!
//! Storage areas, submission identities, rejection records, users and departments.

mod area;
mod department;
mod rejection;
mod submission;
mod user;

pub use area::*;
pub use department::*;
pub use rejection::*;
pub use submission::*;
pub use user::*;
