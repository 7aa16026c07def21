//! # World Module
//!
//! Spatial building blocks shared by every generation stage: grid coordinates,
//! cardinal directions, axis-aligned rectangles and the cell grid itself.

pub mod grid;

pub use grid::*;

use serde::{Deserialize, Serialize};

/// Represents a 2D coordinate on the level grid.
///
/// `x` grows to the east and `y` grows to the south, so `(0, 0)` is the
/// top-left cell of a level.
///
/// # Examples
///
/// ```
/// use delve::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.adjacent_positions();
/// assert_eq!(adjacent.len(), 8); // All 8 surrounding positions
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Squared Euclidean distance. Exact for comparisons, no square root.
    pub fn squared_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx * dx + dy * dy
    }

    /// Returns all 8 adjacent positions (including diagonals).
    pub fn adjacent_positions(self) -> [Position; 8] {
        [
            Position::new(self.x - 1, self.y - 1), // NW
            Position::new(self.x, self.y - 1),     // N
            Position::new(self.x + 1, self.y - 1), // NE
            Position::new(self.x - 1, self.y),     // W
            Position::new(self.x + 1, self.y),     // E
            Position::new(self.x - 1, self.y + 1), // SW
            Position::new(self.x, self.y + 1),     // S
            Position::new(self.x + 1, self.y + 1), // SE
        ]
    }

    /// Returns only the 4 cardinal adjacent positions (no diagonals).
    pub fn cardinal_adjacent_positions(self) -> [Position; 4] {
        [
            Position::new(self.x, self.y - 1), // N
            Position::new(self.x - 1, self.y), // W
            Position::new(self.x + 1, self.y), // E
            Position::new(self.x, self.y + 1), // S
        ]
    }

    /// Moves one step in the given direction.
    pub fn step(self, direction: Direction) -> Position {
        self + direction.to_delta()
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Cardinal directions used by corridor walks and room sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four directions in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Converts a direction to a position delta.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Direction, Position};
    ///
    /// let delta = Direction::North.to_delta();
    /// assert_eq!(delta, Position::new(0, -1));
    /// ```
    pub fn to_delta(self) -> Position {
        match self {
            Direction::North => Position::new(0, -1),
            Direction::South => Position::new(0, 1),
            Direction::East => Position::new(1, 0),
            Direction::West => Position::new(-1, 0),
        }
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// An axis-aligned rectangle of cells, `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Creates a new rectangle from its top-left corner and size.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner of the rectangle.
    pub fn top_left(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Gets the center cell of the rectangle.
    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Gets the area of the rectangle in cells.
    pub fn area(&self) -> u32 {
        (self.width.max(0) * self.height.max(0)) as u32
    }

    /// Checks if a position is inside this rectangle.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Position, Rect};
    ///
    /// let rect = Rect::new(5, 5, 10, 8);
    /// assert!(rect.contains(Position::new(7, 7)));
    /// assert!(!rect.contains(Position::new(15, 5)));
    /// ```
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x && pos.y >= self.y && pos.x < self.right() && pos.y < self.bottom()
    }

    /// Checks if `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Checks if this rectangle overlaps with another rectangle.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x >= other.right()
            || other.x >= self.right()
            || self.y >= other.bottom()
            || other.y >= self.bottom())
    }

    /// Grows (or shrinks, for negative amounts) the rectangle on every side.
    pub fn inflate(&self, amount: i32) -> Rect {
        Rect::new(
            self.x - amount,
            self.y - amount,
            self.width + 2 * amount,
            self.height + 2 * amount,
        )
    }

    /// Smallest rectangle covering both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Iterates every cell of the rectangle in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (self.y..self.bottom()).flat_map(move |y| (self.x..self.right()).map(move |x| Position::new(x, y)))
    }

    /// Cells of the one-cell ring just outside the rectangle, each paired with
    /// the outward direction of the side it belongs to. Corners are skipped.
    pub fn perimeter_ring(&self) -> Vec<(Position, Direction)> {
        let mut ring = Vec::with_capacity((2 * (self.width + self.height)).max(0) as usize);
        for x in self.x..self.right() {
            ring.push((Position::new(x, self.y - 1), Direction::North));
            ring.push((Position::new(x, self.bottom()), Direction::South));
        }
        for y in self.y..self.bottom() {
            ring.push((Position::new(self.x - 1, y), Direction::West));
            ring.push((Position::new(self.right(), y), Direction::East));
        }
        ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_manhattan_distance() {
        let pos1 = Position::new(0, 0);
        let pos2 = Position::new(3, 4);
        assert_eq!(pos1.manhattan_distance(pos2), 7);
    }

    #[test]
    fn test_position_squared_distance() {
        let pos1 = Position::new(0, 0);
        let pos2 = Position::new(3, 4);
        assert_eq!(pos1.squared_distance(pos2), 25.0);
    }

    #[test]
    fn test_position_cardinal_adjacent() {
        let pos = Position::new(5, 5);
        let adjacent = pos.cardinal_adjacent_positions();
        assert!(adjacent.contains(&Position::new(5, 4))); // North
        assert!(adjacent.contains(&Position::new(4, 5))); // West
        assert!(!adjacent.contains(&Position::new(4, 4))); // No diagonal
    }

    #[test]
    fn test_direction_roundtrip() {
        for direction in Direction::ALL {
            let pos = Position::new(3, 3);
            assert_eq!(pos.step(direction).step(direction.opposite()), pos);
        }
    }

    #[test]
    fn test_rect_geometry() {
        let rect = Rect::new(5, 5, 10, 8);
        assert_eq!(rect.right(), 15);
        assert_eq!(rect.bottom(), 13);
        assert_eq!(rect.center(), Position::new(10, 9));
        assert_eq!(rect.area(), 80);
        assert_eq!(rect.positions().count(), 80);
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 5, 5);
        let b = Rect::new(4, 4, 5, 5);
        let c = Rect::new(5, 0, 5, 5);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c)); // Touching edges do not overlap
        assert!(a.inflate(1).intersects(&c));
        assert_eq!(a.union(&c), Rect::new(0, 0, 10, 5));
        assert!(!a.union(&c).contains_rect(&b));
        assert!(Rect::new(0, 0, 20, 20).contains_rect(&b));
    }

    #[test]
    fn test_rect_perimeter_ring() {
        let rect = Rect::new(2, 2, 3, 2);
        let ring = rect.perimeter_ring();
        assert_eq!(ring.len(), 10);
        assert!(ring.contains(&(Position::new(2, 1), Direction::North)));
        assert!(ring.contains(&(Position::new(5, 3), Direction::East)));
        assert!(ring.iter().all(|(pos, _)| !rect.contains(*pos)));
    }
}
