//! Pending-move markers.
//!
//! While a move is in flight the destination key is registered here, and the catalog
//! hides it, so a reader sees the file in the source area only until the source is
//! deleted.

use placedoc_core::Area;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone, Default)]
pub struct InFlightMoves {
    destinations: Arc<Mutex<HashSet<(Area, String)>>>,
}

impl InFlightMoves {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashSet<(Area, String)>> {
        self.destinations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `area/key` as the destination of an unfinished move
    pub fn register(&self, area: Area, key: &str) -> InFlightGuard {
        let slot = (area, key.to_string());
        self.entries().insert(slot.clone());
        InFlightGuard {
            moves: self.clone(),
            slot,
        }
    }

    pub fn contains(&self, area: Area, key: &str) -> bool {
        self.entries().contains(&(area, key.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Clears the marker when dropped
pub struct InFlightGuard {
    moves: InFlightMoves,
    slot: (Area, String),
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.moves.entries().remove(&self.slot);
    }
}
