//! # Corridor Generation
//!
//! Connects rooms into a single graph and carves the corridors that realise
//! its edges.
//!
//! Connectivity comes from Prim's algorithm over room centers: starting from a
//! random room, the closest (connected, unconnected) pair is joined until every
//! room is connected. The result is a spanning tree with exactly `n - 1`
//! corridors. Optional loop corridors are added on top.

use crate::{
    CellMask, CellState, Corridor, CorridorStyle, Direction, GenerationConfig, Grid, Position,
    RandomSource, Room, RoomId,
};
use log::debug;

/// Relative weights of the concrete styles when [`CorridorStyle::Random`] is used.
const STYLE_WEIGHTS: [(CorridorStyle, f64); 3] = [
    (CorridorStyle::Straight, 0.4),
    (CorridorStyle::LShaped, 0.3),
    (CorridorStyle::Organic, 0.3),
];

/// Carves corridor geometry into a grid, recording every carved cell in a
/// corridor mask.
pub struct CorridorCarver<'a> {
    grid: &'a mut Grid,
    corridor_cells: &'a mut CellMask,
    /// Corridor width in cells
    pub width: i32,
    /// Probability that an organic step wanders off the direct route
    pub winding_factor: f64,
}

impl<'a> CorridorCarver<'a> {
    /// Creates a carver writing into `grid` and `corridor_cells`.
    pub fn new(
        grid: &'a mut Grid,
        corridor_cells: &'a mut CellMask,
        width: u32,
        winding_factor: f64,
    ) -> Self {
        Self {
            grid,
            corridor_cells,
            width: width.max(1) as i32,
            winding_factor,
        }
    }

    /// Marks a square around `center` as corridor floor. Border cells are
    /// left untouched so walls can always enclose the floor.
    fn brush(&mut self, center: Position, half_low: i32, half_high: i32) {
        for dy in -half_low..=half_high {
            for dx in -half_low..=half_high {
                let pos = Position::new(center.x + dx, center.y + dy);
                if self.grid.is_border(pos) {
                    continue;
                }
                if self.grid.carve(pos, CellState::Floor) {
                    self.corridor_cells.insert(pos);
                }
            }
        }
    }

    /// Carves one corridor-width cell.
    fn carve_cell(&mut self, pos: Position) {
        let width = self.width;
        self.brush(pos, (width - 1) / 2, width / 2);
    }

    fn carve_horizontal(&mut self, y: i32, x1: i32, x2: i32) {
        for x in x1.min(x2)..=x1.max(x2) {
            self.carve_cell(Position::new(x, y));
        }
    }

    fn carve_vertical(&mut self, x: i32, y1: i32, y2: i32) {
        for y in y1.min(y2)..=y1.max(y2) {
            self.carve_cell(Position::new(x, y));
        }
    }

    /// Carves a corridor of the given concrete style.
    ///
    /// [`CorridorStyle::Random`] is treated as [`CorridorStyle::Straight`];
    /// resolve it with [`resolve_style`] first.
    pub fn carve(
        &mut self,
        style: CorridorStyle,
        from: Position,
        to: Position,
        rng: &mut dyn RandomSource,
    ) {
        match style {
            CorridorStyle::Straight | CorridorStyle::Random => {
                let horizontal_first = rng.chance(0.5);
                self.carve_straight(from, to, horizontal_first);
            }
            CorridorStyle::LShaped => self.carve_l_shaped(from, to),
            CorridorStyle::Organic => self.carve_organic(from, to, rng),
        }
    }

    /// Two axis-aligned segments meeting at a corner.
    pub fn carve_straight(&mut self, from: Position, to: Position, horizontal_first: bool) {
        if horizontal_first {
            self.carve_horizontal(from.y, from.x, to.x);
            self.carve_vertical(to.x, from.y, to.y);
        } else {
            self.carve_vertical(from.x, from.y, to.y);
            self.carve_horizontal(to.y, from.x, to.x);
        }
    }

    /// Horizontal-then-vertical segments with the corner widened by one cell
    /// on every side of the corridor.
    pub fn carve_l_shaped(&mut self, from: Position, to: Position) {
        self.carve_straight(from, to, true);
        let reach = (self.width - 1) / 2 + 1;
        self.brush(Position::new(to.x, from.y), reach, reach);
    }

    /// Random walk from `from` to `to`, dilated to the corridor width.
    ///
    /// Each step heads along the axis with the most remaining distance with
    /// probability `1 - winding_factor`, otherwise in a random direction. The
    /// walk stays off the grid border. A walk that exceeds its step budget is
    /// finished with a straight corridor.
    pub fn carve_organic(&mut self, from: Position, to: Position, rng: &mut dyn RandomSource) {
        let (width, height) = (self.grid.width as i32, self.grid.height as i32);
        let (min_x, max_x) = if width > 2 { (1, width - 2) } else { (0, width - 1) };
        let (min_y, max_y) = if height > 2 { (1, height - 2) } else { (0, height - 1) };
        let max_steps = (width * height * 4).max(64) as usize;

        let mut current = from;
        let mut visited = vec![current];
        while current != to && visited.len() <= max_steps {
            let direction = if rng.chance(1.0 - self.winding_factor) {
                direction_towards(current, to)
            } else {
                Direction::ALL[rng.next_int(0, 4) as usize]
            };
            let next = current.step(direction);
            current = Position::new(next.x.clamp(min_x, max_x), next.y.clamp(min_y, max_y));
            visited.push(current);
        }

        for pos in visited {
            self.carve_cell(pos);
        }
        if current != to {
            debug!("Organic corridor ran out of steps at {:?}, finishing straight", current);
            self.carve_straight(current, to, true);
        }
    }
}

/// Step direction along the axis with the greatest remaining distance.
pub fn direction_towards(from: Position, to: Position) -> Direction {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx.abs() >= dy.abs() {
        if dx > 0 {
            Direction::East
        } else {
            Direction::West
        }
    } else if dy > 0 {
        Direction::South
    } else {
        Direction::North
    }
}

/// Resolves [`CorridorStyle::Random`] to a concrete style; other styles pass through.
pub fn resolve_style(style: CorridorStyle, rng: &mut dyn RandomSource) -> CorridorStyle {
    if style != CorridorStyle::Random {
        return style;
    }
    let total: f64 = STYLE_WEIGHTS.iter().map(|(_, weight)| weight).sum();
    let mut roll = rng.next_float() * total;
    for (candidate, weight) in STYLE_WEIGHTS {
        if roll < weight {
            return candidate;
        }
        roll -= weight;
    }
    CorridorStyle::Straight
}

/// Builds the room graph and carves its corridors.
#[derive(Debug, Clone)]
pub struct GraphConnector {
    pub style: CorridorStyle,
    pub corridor_width: u32,
    pub winding_factor: f64,
    /// Whether to add loop corridors after the spanning tree
    pub loop_corridors: bool,
    /// Loop corridors as a fraction of the room count
    pub loop_corridor_ratio: f64,
}

impl GraphConnector {
    /// Creates a connector from the configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            style: config.corridor_style,
            corridor_width: config.corridor_width,
            winding_factor: config.winding_factor,
            loop_corridors: config.loop_corridors,
            loop_corridor_ratio: config.loop_corridor_ratio,
        }
    }

    /// Connects every room, carving corridors into `grid`.
    ///
    /// Returns the corridors in carving order: the spanning tree first, then
    /// any loop corridors.
    pub fn connect(
        &self,
        grid: &mut Grid,
        corridor_cells: &mut CellMask,
        rooms: &mut [Room],
        rng: &mut dyn RandomSource,
    ) -> Vec<Corridor> {
        let mut corridors = Vec::new();
        if rooms.len() < 2 {
            return corridors;
        }

        let mut carver = CorridorCarver::new(grid, corridor_cells, self.corridor_width, self.winding_factor);

        for (from, to) in spanning_tree(rooms, rng) {
            corridors.push(self.join(&mut carver, rooms, from, to, true, rng));
        }

        if self.loop_corridors {
            let wanted = (rooms.len() as f64 * self.loop_corridor_ratio).round() as usize;
            let mut added = 0;
            let mut attempts = 0;
            while added < wanted && attempts < wanted * 4 {
                attempts += 1;
                let a = rng.next_int(0, rooms.len() as i32) as usize;
                let b = rng.next_int(0, rooms.len() as i32) as usize;
                // Already-joined pairs are skipped rather than carved twice
                if a == b || rooms[a].is_connected_to(b as RoomId) {
                    continue;
                }
                corridors.push(self.join(&mut carver, rooms, a, b, false, rng));
                added += 1;
            }
            debug!("Added {} loop corridors", added);
        }

        corridors
    }

    fn join(
        &self,
        carver: &mut CorridorCarver<'_>,
        rooms: &mut [Room],
        from: usize,
        to: usize,
        spanning: bool,
        rng: &mut dyn RandomSource,
    ) -> Corridor {
        let style = resolve_style(self.style, rng);
        carver.carve(style, rooms[from].center, rooms[to].center, rng);

        let (from_id, to_id) = (rooms[from].id, rooms[to].id);
        rooms[from].add_connection(to_id);
        rooms[to].add_connection(from_id);

        Corridor {
            from: from_id,
            to: to_id,
            style,
            spanning,
        }
    }
}

/// Prim's minimum spanning tree over room centers by Euclidean distance.
///
/// Starts from a random room and returns `n - 1` edges as
/// `(connected, newly connected)` index pairs. Ties go to the lowest indices.
pub fn spanning_tree(rooms: &[Room], rng: &mut dyn RandomSource) -> Vec<(usize, usize)> {
    let Some(start) = rng.next_index(rooms.len()) else {
        return Vec::new();
    };

    let mut connected = vec![false; rooms.len()];
    connected[start] = true;
    let mut edges = Vec::with_capacity(rooms.len().saturating_sub(1));

    while edges.len() + 1 < rooms.len() {
        let mut best: Option<(f64, usize, usize)> = None;
        for (a, room_a) in rooms.iter().enumerate().filter(|(i, _)| connected[*i]) {
            for (b, room_b) in rooms.iter().enumerate().filter(|(i, _)| !connected[*i]) {
                let distance = room_a.center.squared_distance(room_b.center);
                if best.map_or(true, |(d, _, _)| distance < d) {
                    best = Some((distance, a, b));
                }
            }
        }

        let Some((_, a, b)) = best else { break };
        connected[b] = true;
        edges.push((a, b));
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rect, RoomShape, SeededRandom};

    fn rooms_at(centers: &[(i32, i32)]) -> Vec<Room> {
        centers
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Room::new(i as u32, Rect::new(x - 2, y - 2, 5, 5), RoomShape::Rectangle))
            .collect()
    }

    #[test]
    fn test_direction_towards() {
        let origin = Position::new(5, 5);
        assert_eq!(direction_towards(origin, Position::new(9, 6)), Direction::East);
        assert_eq!(direction_towards(origin, Position::new(1, 6)), Direction::West);
        assert_eq!(direction_towards(origin, Position::new(6, 1)), Direction::North);
        assert_eq!(direction_towards(origin, Position::new(6, 12)), Direction::South);
    }

    #[test]
    fn test_resolve_style() {
        let mut rng = SeededRandom::new(1);
        assert_eq!(resolve_style(CorridorStyle::Organic, &mut rng), CorridorStyle::Organic);
        for _ in 0..50 {
            assert_ne!(resolve_style(CorridorStyle::Random, &mut rng), CorridorStyle::Random);
        }
    }

    #[test]
    fn test_straight_corridor_connects_endpoints() {
        let mut grid = Grid::new(30, 30);
        let mut mask = CellMask::new(30, 30);
        let mut carver = CorridorCarver::new(&mut grid, &mut mask, 1, 0.0);

        carver.carve_straight(Position::new(3, 4), Position::new(20, 15), true);

        assert!(grid.is(Position::new(3, 4), CellState::Floor));
        assert!(grid.is(Position::new(20, 4), CellState::Floor)); // Corner
        assert!(grid.is(Position::new(20, 15), CellState::Floor));
        assert_eq!(grid.count(CellState::Floor), 18 + 11);
        assert_eq!(mask.len(), grid.count(CellState::Floor));
    }

    #[test]
    fn test_corridor_width() {
        let mut grid = Grid::new(30, 30);
        let mut mask = CellMask::new(30, 30);
        let mut carver = CorridorCarver::new(&mut grid, &mut mask, 3, 0.0);

        carver.carve_straight(Position::new(5, 10), Position::new(15, 10), true);
        // 11 cells long, 3 wide
        assert_eq!(grid.count(CellState::Floor), 33);
        assert!(grid.is(Position::new(10, 9), CellState::Floor));
        assert!(grid.is(Position::new(10, 11), CellState::Floor));
        assert!(!grid.is(Position::new(10, 12), CellState::Floor));
    }

    #[test]
    fn test_l_shaped_corner_is_widened() {
        let mut grid = Grid::new(30, 30);
        let mut mask = CellMask::new(30, 30);
        let mut carver = CorridorCarver::new(&mut grid, &mut mask, 1, 0.0);

        carver.carve_l_shaped(Position::new(2, 2), Position::new(12, 12));
        for pos in Position::new(12, 2).adjacent_positions() {
            assert!(grid.is(pos, CellState::Floor), "{:?} not carved", pos);
        }
    }

    #[test]
    fn test_wide_l_corner_stays_off_border() {
        let mut grid = Grid::new(30, 30);
        let mut mask = CellMask::new(30, 30);
        let mut carver = CorridorCarver::new(&mut grid, &mut mask, 3, 0.0);

        carver.carve_l_shaped(Position::new(3, 3), Position::new(20, 20));

        assert!(grid.positions().all(|p| !grid.is_border(p) || grid.is(p, CellState::Empty)));
        // Corner square spans two cells either side of the bend
        assert!(grid.is(Position::new(18, 1), CellState::Floor));
        assert!(grid.is(Position::new(22, 5), CellState::Floor));
        assert!(!grid.is(Position::new(23, 3), CellState::Floor));
        let reached = crate::reachable_cells(&grid, Position::new(3, 3), CellState::is_passable);
        assert!(reached.contains(&Position::new(20, 20)));
    }

    #[test]
    fn test_organic_corridor_reaches_target() {
        for seed in 0..20 {
            let mut grid = Grid::new(40, 40);
            let mut mask = CellMask::new(40, 40);
            let mut rng = SeededRandom::new(seed);
            let mut carver = CorridorCarver::new(&mut grid, &mut mask, 1, 0.6);

            let (from, to) = (Position::new(3, 3), Position::new(35, 30));
            carver.carve_organic(from, to, &mut rng);

            let reached = crate::reachable_cells(&grid, from, CellState::is_passable);
            assert!(reached.contains(&to), "seed {seed} did not connect");
            // The walk never touches the border
            assert!(grid.positions().all(|p| !grid.is_border(p) || grid.is(p, CellState::Empty)));
        }
    }

    #[test]
    fn test_spanning_tree_picks_nearest() {
        let rooms = rooms_at(&[(5, 5), (15, 5), (40, 5), (16, 20)]);
        let mut rng = SeededRandom::new(3);
        let edges = spanning_tree(&rooms, &mut rng);

        assert_eq!(edges.len(), 3);
        let mut normalized: Vec<(usize, usize)> =
            edges.iter().map(|&(a, b)| (a.min(b), a.max(b))).collect();
        normalized.sort();
        assert_eq!(normalized, vec![(0, 1), (1, 2), (1, 3)]);
    }

    #[test]
    fn test_connect_builds_symmetric_tree() {
        let mut rooms = rooms_at(&[(5, 5), (20, 5), (35, 5), (5, 25), (20, 25), (35, 25)]);
        let mut grid = Grid::new(45, 35);
        let mut mask = CellMask::new(45, 35);
        let mut rng = SeededRandom::new(17);
        let connector = GraphConnector::from_config(&GenerationConfig::default());

        let corridors = connector.connect(&mut grid, &mut mask, &mut rooms, &mut rng);

        assert_eq!(corridors.len(), rooms.len() - 1);
        assert!(corridors.iter().all(|c| c.spanning && c.style != CorridorStyle::Random));
        for room in &rooms {
            assert!(!room.connections.is_empty());
            for &other in &room.connections {
                assert!(rooms[other as usize].is_connected_to(room.id));
            }
        }
        let reached = crate::reachable_cells(&grid, rooms[0].center, CellState::is_passable);
        for room in &rooms {
            assert!(reached.contains(&room.center));
        }
    }

    #[test]
    fn test_loop_corridors_never_duplicate_edges() {
        let mut rooms = rooms_at(&[(5, 5), (20, 5), (35, 5), (5, 25), (20, 25), (35, 25)]);
        let mut grid = Grid::new(45, 35);
        let mut mask = CellMask::new(45, 35);
        let mut rng = SeededRandom::new(4);
        let connector = GraphConnector {
            loop_corridors: true,
            loop_corridor_ratio: 0.5,
            ..GraphConnector::from_config(&GenerationConfig::default())
        };

        let corridors = connector.connect(&mut grid, &mut mask, &mut rooms, &mut rng);
        let spanning = corridors.iter().filter(|c| c.spanning).count();
        assert_eq!(spanning, 5);

        let mut pairs: Vec<(u32, u32)> =
            corridors.iter().map(|c| (c.from.min(c.to), c.from.max(c.to))).collect();
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total);
    }

    #[test]
    fn test_single_room_needs_no_corridors() {
        let mut rooms = rooms_at(&[(5, 5)]);
        let mut grid = Grid::new(20, 20);
        let mut mask = CellMask::new(20, 20);
        let mut rng = SeededRandom::new(1);
        let connector = GraphConnector::from_config(&GenerationConfig::default());

        assert!(connector.connect(&mut grid, &mut mask, &mut rooms, &mut rng).is_empty());
        assert!(mask.is_empty());
    }
}
