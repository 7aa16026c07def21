//! # Level Grid
//!
//! The cell grid every generation stage writes into. A grid is allocated once
//! per generation attempt and never reset in place; a retry builds a new one.

use crate::{DelveError, DelveResult, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CellState {
    /// Solid, unexcavated space
    #[default]
    Empty,
    /// Walkable floor (room interior or corridor)
    Floor,
    /// Wall bordering walkable space
    Wall,
    /// Doorway on a room perimeter
    Door,
    /// Standing water inside a room
    Water,
    /// Pillar, rubble or other blocking feature inside a room
    Obstacle,
}

impl CellState {
    /// Returns true if a walker can stand on this cell.
    pub fn is_passable(self) -> bool {
        matches!(self, CellState::Floor | CellState::Door)
    }

    /// Character used by the text dump.
    pub fn glyph(self) -> char {
        match self {
            CellState::Empty => ' ',
            CellState::Floor => '.',
            CellState::Wall => '#',
            CellState::Door => '+',
            CellState::Water => '~',
            CellState::Obstacle => 'o',
        }
    }
}

/// A 2D array of cell states over `[0, width) × [0, height)`, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// Width of the grid in cells
    pub width: u32,
    /// Height of the grid in cells
    pub height: u32,
    cells: Vec<CellState>,
}

impl Grid {
    /// Creates a grid filled with [`CellState::Empty`].
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{CellState, Grid, Position};
    ///
    /// let grid = Grid::new(20, 10);
    /// assert_eq!(grid.get(Position::new(19, 9)), Some(CellState::Empty));
    /// assert_eq!(grid.get(Position::new(20, 0)), None);
    /// ```
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![CellState::Empty; (width as usize) * (height as usize)],
        }
    }

    /// Checks whether a position lies inside the grid.
    pub fn is_valid_position(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Checks whether a position lies on the outermost ring of cells.
    pub fn is_border(&self, pos: Position) -> bool {
        self.is_valid_position(pos)
            && (pos.x == 0
                || pos.y == 0
                || pos.x as u32 == self.width - 1
                || pos.y as u32 == self.height - 1)
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.is_valid_position(pos) {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Gets the state at a position, or `None` outside the grid.
    pub fn get(&self, pos: Position) -> Option<CellState> {
        self.index(pos).map(|idx| self.cells[idx])
    }

    /// Returns true if the cell exists and is in the given state.
    pub fn is(&self, pos: Position, state: CellState) -> bool {
        self.get(pos) == Some(state)
    }

    /// Returns true if the cell exists and is passable.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.get(pos).is_some_and(CellState::is_passable)
    }

    /// Sets the state at a position.
    ///
    /// Fails with [`DelveError::OutOfBounds`] outside the grid.
    pub fn set(&mut self, pos: Position, state: CellState) -> DelveResult<()> {
        let idx = self.index(pos).ok_or(DelveError::OutOfBounds(pos))?;
        self.cells[idx] = state;
        Ok(())
    }

    /// Sets the state if the position is inside the grid; positions outside
    /// are clipped. Returns whether a cell was written.
    pub fn carve(&mut self, pos: Position, state: CellState) -> bool {
        match self.index(pos) {
            Some(idx) => {
                self.cells[idx] = state;
                true
            }
            None => false,
        }
    }

    /// Iterates every position of the grid in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        let width = self.width as i32;
        (0..self.height as i32).flat_map(move |y| (0..width).map(move |x| Position::new(x, y)))
    }

    /// Counts the cells in the given state.
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|&&cell| cell == state).count()
    }

    /// Counts passable cells (floor and doors).
    pub fn passable_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_passable()).count()
    }

    /// All positions in the given state, in row-major order.
    pub fn positions_of(&self, state: CellState) -> Vec<Position> {
        self.positions().filter(|&pos| self.is(pos, state)).collect()
    }

    /// Counts the 8-neighbourhood cells that are floor or outside the grid.
    pub fn floor_or_outside_neighbors(&self, pos: Position) -> usize {
        pos.adjacent_positions()
            .iter()
            .filter(|&&n| match self.get(n) {
                Some(state) => state == CellState::Floor,
                None => true,
            })
            .count()
    }

    /// Renders one text line per row using [`CellState::glyph`].
    pub fn rows(&self) -> Vec<String> {
        (0..self.height as i32)
            .map(|y| {
                (0..self.width as i32)
                    .map(|x| self.get(Position::new(x, y)).unwrap_or_default().glyph())
                    .collect()
            })
            .collect()
    }
}

/// A set of grid cells stored as a bitmap over the grid's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl CellMask {
    /// Creates an empty mask for a `width × height` grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Returns true if the position is in the set.
    pub fn contains(&self, pos: Position) -> bool {
        self.index(pos).is_some_and(|idx| self.bits[idx])
    }

    /// Adds a position; positions outside the grid are ignored.
    pub fn insert(&mut self, pos: Position) {
        if let Some(idx) = self.index(pos) {
            self.bits[idx] = true;
        }
    }

    /// Number of positions in the set.
    pub fn len(&self) -> usize {
        self.bits.iter().filter(|&&bit| bit).count()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        !self.bits.contains(&true)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            writeln!(f, "{}", row.trim_end())?;
        }
        Ok(())
    }
}
