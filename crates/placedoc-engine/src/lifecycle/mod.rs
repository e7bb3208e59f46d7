//! File lifecycle: upload, archive and reject of submission files.

pub mod engine;
pub mod in_flight;
pub mod locks;
pub mod mover;

pub use engine::{Ack, LifecycleEngine};
pub use in_flight::{InFlightGuard, InFlightMoves};
pub use locks::KeyLocks;
pub use mover::{MoveControl, MoveProgress, MoveState, Mover};
