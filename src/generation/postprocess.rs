//! # Post-Processing
//!
//! Finishing passes run after the room graph is known: cellular automata
//! smoothing, connectivity repair, walls, doors, room features and the
//! key/lock assignment.

use crate::{
    connected_regions, random, reachable_cells, CellMask, CellState, CorridorCarver, Door, DoorId,
    GenerationConfig, Grid, KeyPlacement, Position, RandomSource, Room, RoomId, RoomTag, RoomType,
};
use log::debug;
use uuid::{Builder, Uuid};

/// Floor cells with fewer floor-or-outside neighbours than this erode.
const EROSION_THRESHOLD: usize = 4;
/// Empty cells with more floor-or-outside neighbours than this fill in.
const FILL_THRESHOLD: usize = 4;
/// Probability that a lockable door is locked.
const LOCK_CHANCE: f64 = 0.5;
/// Smallest room side that may receive features.
const FEATURE_MIN_ROOM_SIZE: u32 = 7;
/// Room cells per placed feature cell.
const CELLS_PER_FEATURE: u32 = 25;

/// Doors and keys produced by post-processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Furnishing {
    pub doors: Vec<Door>,
    pub keys: Vec<KeyPlacement>,
}

/// Runs the finishing passes over a carved level.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    pub smoothing_iterations: u32,
    /// Width of repair corridors
    pub corridor_width: u32,
    pub winding_factor: f64,
    pub use_key_system: bool,
    pub feature_chance: f64,
}

impl PostProcessor {
    /// Creates a post-processor from the configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            smoothing_iterations: config.smoothing_iterations,
            corridor_width: config.corridor_width,
            winding_factor: config.winding_factor,
            use_key_system: config.use_key_system,
            feature_chance: config.feature_chance,
        }
    }

    /// Runs every pass in order, updating `grid`, `corridor_cells` and the
    /// rooms' door lists.
    pub fn process(
        &self,
        grid: &mut Grid,
        corridor_cells: &mut CellMask,
        rooms: &mut [Room],
        rng: &mut dyn RandomSource,
    ) -> Furnishing {
        self.smooth(grid, corridor_cells, rooms);
        let repaired = self.repair_connectivity(grid, corridor_cells, rng);
        let walls = place_walls(grid);
        let mut doors = self.place_doors(grid, rooms, rng);
        let features = self.place_features(grid, rooms, rng);
        let keys = assign_keys(grid, rooms, &mut doors, rng);

        debug!(
            "Post-processing: {} regions repaired, {} walls, {} doors, {} feature cells, {} keys",
            repaired,
            walls,
            doors.len(),
            features,
            keys.len()
        );
        Furnishing { doors, keys }
    }

    /// Cellular automata smoothing.
    ///
    /// Each pass reads a snapshot of the grid. A floor cell with fewer than 4
    /// floor-or-outside 8-neighbours reverts to empty; an empty cell with more
    /// than 4 becomes floor. Corridor cells and cells of special rooms never
    /// change, and border cells are never filled.
    pub fn smooth(&self, grid: &mut Grid, corridor_cells: &CellMask, rooms: &[Room]) {
        if self.smoothing_iterations == 0 {
            return;
        }

        let mut protected = corridor_cells.clone();
        for room in rooms.iter().filter(|room| room.room_type.is_special()) {
            for cell in room.cells() {
                protected.insert(cell);
            }
        }

        for _ in 0..self.smoothing_iterations {
            let snapshot = grid.clone();
            for pos in snapshot.positions() {
                if protected.contains(pos) {
                    continue;
                }
                let neighbors = snapshot.floor_or_outside_neighbors(pos);
                match snapshot.get(pos) {
                    Some(CellState::Floor) if neighbors < EROSION_THRESHOLD => {
                        grid.carve(pos, CellState::Empty);
                    }
                    Some(CellState::Empty) if neighbors > FILL_THRESHOLD && !snapshot.is_border(pos) => {
                        grid.carve(pos, CellState::Floor);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Joins every floor region to the largest one with an organic corridor
    /// between their closest cells.
    ///
    /// Returns the number of regions that were joined.
    pub fn repair_connectivity(
        &self,
        grid: &mut Grid,
        corridor_cells: &mut CellMask,
        rng: &mut dyn RandomSource,
    ) -> usize {
        let mut regions = connected_regions(grid, |cell| cell == CellState::Floor);
        if regions.len() < 2 {
            return 0;
        }
        // Stable sort keeps discovery order among equal sizes
        regions.sort_by(|a, b| b.len().cmp(&a.len()));

        let (main, others) = regions.split_at(1);
        let main = &main[0];
        let mut carver = CorridorCarver::new(grid, corridor_cells, self.corridor_width, self.winding_factor);
        for region in others {
            if let Some((from, to)) = closest_pair(main, region) {
                carver.carve_organic(from, to, rng);
            }
        }
        others.len()
    }

    /// Places one door per room where a corridor meets its perimeter.
    ///
    /// Candidates lie on the ring just outside the room bounds, with a covered
    /// floor cell inside and a floor cell outside. Corridor entries (floor)
    /// are preferred over walls. Rooms without a candidate get no door.
    ///
    /// A door is only locked when it is the sole way into its room from the
    /// entrance; a room with another opening keeps an unlocked door.
    pub fn place_doors(&self, grid: &mut Grid, rooms: &mut [Room], rng: &mut dyn RandomSource) -> Vec<Door> {
        let mut doors = Vec::new();
        let entrance = rooms
            .iter()
            .find(|room| room.room_type == RoomType::Entrance)
            .map(|room| room.center);

        for room in rooms.iter_mut() {
            let mut entries = Vec::new();
            let mut walls = Vec::new();
            for (pos, outward) in room.bounds.perimeter_ring() {
                let inside = pos.step(outward.opposite());
                let outside = pos.step(outward);
                if !room.covers(inside) || !grid.is(inside, CellState::Floor) || !grid.is(outside, CellState::Floor) {
                    continue;
                }
                match grid.get(pos) {
                    Some(CellState::Floor) => entries.push(pos),
                    Some(CellState::Wall) => walls.push(pos),
                    _ => {}
                }
            }

            let candidates = if entries.is_empty() { &walls } else { &entries };
            let Some(&position) = random::choose(rng, candidates) else {
                debug!("Room {} has no door candidate", room.id);
                continue;
            };

            let lockable = matches!(room.room_type, RoomType::Treasure | RoomType::Shop | RoomType::Boss);
            let wants_lock = lockable && self.use_key_system && rng.chance(LOCK_CHANCE);
            let is_locked = wants_lock
                && entrance.is_some_and(|start| door_seals_room(grid, position, room, start));
            if wants_lock && !is_locked {
                debug!("Room {} has another opening, leaving door unlocked", room.id);
            }
            let door = Door {
                id: doors.len() as DoorId,
                position,
                room: room.id,
                is_locked,
                is_hidden: room.room_type == RoomType::Secret,
                key_id: random_uuid(rng),
            };

            grid.carve(position, CellState::Door);
            room.doors.push(door.id);
            doors.push(door);
        }

        doors
    }

    /// Scatters water or obstacle cells in large normal rooms.
    ///
    /// A feature cell is only placed where all 8 neighbours are floor, which
    /// keeps the room 4-connected. Room centers stay floor.
    ///
    /// Returns the number of feature cells placed.
    pub fn place_features(&self, grid: &mut Grid, rooms: &[Room], rng: &mut dyn RandomSource) -> usize {
        let mut placed = 0;

        for room in rooms {
            if room.room_type != RoomType::Normal || !room.fits(FEATURE_MIN_ROOM_SIZE) {
                continue;
            }
            if !rng.chance(self.feature_chance) {
                continue;
            }

            let feature = if rng.chance(0.5) {
                CellState::Water
            } else {
                CellState::Obstacle
            };
            let budget = (room.area() / CELLS_PER_FEATURE).max(1) as usize;
            let mut cells: Vec<Position> = room.cells().filter(|&cell| cell != room.center).collect();
            random::shuffle(rng, &mut cells);

            let mut count = 0;
            for cell in cells {
                if count == budget {
                    break;
                }
                let enclosed = grid.is(cell, CellState::Floor)
                    && cell.adjacent_positions().iter().all(|&n| grid.is(n, CellState::Floor));
                if enclosed {
                    grid.carve(cell, feature);
                    count += 1;
                }
            }
            placed += count;
        }

        placed
    }
}

/// Turns every empty cell 8-adjacent to floor into a wall.
///
/// Returns the number of walls placed.
pub fn place_walls(grid: &mut Grid) -> usize {
    let walls: Vec<Position> = grid
        .positions()
        .filter(|&pos| {
            grid.is(pos, CellState::Empty)
                && pos.adjacent_positions().iter().any(|&n| grid.is(n, CellState::Floor))
        })
        .collect();

    for &pos in &walls {
        grid.carve(pos, CellState::Wall);
    }
    walls.len()
}

/// True when blocking `door` leaves no passable route from `entrance` into
/// any cell of `room`.
fn door_seals_room(grid: &Grid, door: Position, room: &Room, entrance: Position) -> bool {
    let mut blocked = grid.clone();
    blocked.carve(door, CellState::Wall);
    !reachable_cells(&blocked, entrance, CellState::is_passable)
        .into_iter()
        .any(|cell| room.covers(cell))
}

/// Places a key for every locked door.
///
/// The key room is a critical-path room closer to the entrance than the
/// locked room, or failing that any room closer to the entrance. When no
/// such room holds a free floor cell the door is unlocked instead.
pub fn assign_keys(
    grid: &Grid,
    rooms: &[Room],
    doors: &mut [Door],
    rng: &mut dyn RandomSource,
) -> Vec<KeyPlacement> {
    let mut keys: Vec<KeyPlacement> = Vec::new();

    for door in doors.iter_mut().filter(|door| door.is_locked) {
        let lock_distance = rooms
            .get(door.room as usize)
            .and_then(|room| room.distance_from_start);
        let closer = |room: &&Room| {
            room.id != door.room
                && matches!(
                    (room.distance_from_start, lock_distance),
                    (Some(d), Some(lock)) if d < lock
                )
        };

        let on_path: Vec<RoomId> = rooms
            .iter()
            .filter(closer)
            .filter(|room| room.has_tag(RoomTag::CriticalPath))
            .map(|room| room.id)
            .collect();
        let candidates: Vec<RoomId> = if on_path.is_empty() {
            rooms.iter().filter(closer).map(|room| room.id).collect()
        } else {
            on_path
        };

        let placement = random::choose(rng, &candidates).and_then(|&key_room| {
            let free: Vec<Position> = rooms[key_room as usize]
                .cells()
                .filter(|&cell| grid.is(cell, CellState::Floor))
                .filter(|cell| keys.iter().all(|key| key.position != *cell))
                .collect();
            random::choose(rng, &free).map(|&position| (key_room, position))
        });

        match placement {
            Some((room, position)) => keys.push(KeyPlacement {
                key_id: door.key_id,
                door: door.id,
                position,
                room,
                lock_room: door.room,
            }),
            None => {
                debug!("No key room for door {}, unlocking it", door.id);
                door.is_locked = false;
            }
        }
    }

    keys
}

/// Closest `(a, b)` pair by Euclidean distance with `a` in `main` and `b` in
/// `other`. Ties go to the first pair found.
pub fn closest_pair(main: &[Position], other: &[Position]) -> Option<(Position, Position)> {
    let mut best: Option<(f64, Position, Position)> = None;
    for &a in main {
        for &b in other {
            let distance = a.squared_distance(b);
            if best.map_or(true, |(d, _, _)| distance < d) {
                best = Some((distance, a, b));
            }
        }
    }
    best.map(|(_, a, b)| (a, b))
}

/// Version 4 UUID drawn from the level's random source.
fn random_uuid(rng: &mut dyn RandomSource) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&rng.next_u64().to_le_bytes());
    bytes[8..].copy_from_slice(&rng.next_u64().to_le_bytes());
    Builder::from_random_bytes(bytes).into_uuid()
}
