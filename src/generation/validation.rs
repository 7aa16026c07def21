//! # Level Validation
//!
//! Acceptance checks run on every generation attempt. A failed check makes
//! the generator retry.

use crate::{reachable_cells, CellState, Level};
use log::debug;
use thiserror::Error;

/// Reason a generated level was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("level has no entrance room")]
    MissingEntrance,

    #[error("level has no exit room")]
    MissingExit,

    #[error("no critical path joins entrance and exit")]
    NoCriticalPath,

    #[error("level has {found} rooms, at least {required} required")]
    TooFewRooms { found: usize, required: usize },

    #[error("entrance room center is not walkable")]
    EntranceBlocked,

    #[error("only {reachable} of {total} walkable cells are reachable from the entrance")]
    UnreachableFloor { reachable: usize, total: usize },
}

/// Checks generated levels against the acceptance criteria.
#[derive(Debug, Clone, Copy)]
pub struct LevelValidator {
    /// Fewest rooms an accepted level may have
    pub min_room_count: usize,
}

impl LevelValidator {
    pub fn new(min_room_count: usize) -> Self {
        Self { min_room_count }
    }

    /// Runs every check in order and reports the first failure.
    ///
    /// 1. an entrance and an exit exist
    /// 2. the critical path is non-empty
    /// 3. there are at least `min_room_count` rooms
    /// 4. a flood fill from the entrance center reaches every floor and door cell
    pub fn check(&self, level: &Level) -> Result<(), ValidationFailure> {
        let entrance = level
            .entrance
            .and_then(|id| level.rooms.get(id as usize))
            .ok_or(ValidationFailure::MissingEntrance)?;
        level
            .exit
            .and_then(|id| level.rooms.get(id as usize))
            .ok_or(ValidationFailure::MissingExit)?;

        if level.critical_path.is_empty() {
            return Err(ValidationFailure::NoCriticalPath);
        }

        if level.rooms.len() < self.min_room_count {
            return Err(ValidationFailure::TooFewRooms {
                found: level.rooms.len(),
                required: self.min_room_count,
            });
        }

        if !level.grid.is_passable(entrance.center) {
            return Err(ValidationFailure::EntranceBlocked);
        }

        let total = level.grid.passable_count();
        let reachable = reachable_cells(&level.grid, entrance.center, CellState::is_passable).len();
        if reachable != total {
            return Err(ValidationFailure::UnreachableFloor { reachable, total });
        }

        debug!("Level accepted: {} rooms, {} walkable cells", level.rooms.len(), total);
        Ok(())
    }
}
