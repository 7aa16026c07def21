//! # Dungeon Generation
//!
//! The full layout pipeline and the retry loop around it.
//!
//! [`LayoutGenerator`] runs one attempt of the pipeline (partition, rooms,
//! corridors, topology, post-processing) against a random source.
//! [`DungeonGenerator`] validates the configuration, seeds each attempt, and
//! retries until the [`LevelValidator`] accepts a level or the attempt budget
//! runs out.

use crate::{
    carve_room, derive_attempt_seed, enforce_room_limit, CellMask, Corridor, DelveError, DelveResult,
    Door, DoorId, GenerationConfig, Generator, GraphConnector, Grid, KeyPlacement, LevelValidator,
    PostProcessor, RandomSource, Rect, RetryPolicy, Room, RoomId, RoomPlacer, RoomType,
    SeededRandom, SpacePartitioner, TopologyAnalyzer,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A generated dungeon level: the cell grid plus the room graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub grid: Grid,
    /// Rooms indexed by their id
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    /// Cells carved by corridors (not persisted)
    #[serde(skip)]
    pub corridor_cells: CellMask,
    /// Doors indexed by their id
    pub doors: Vec<Door>,
    pub keys: Vec<KeyPlacement>,
    /// Room ids from entrance to exit
    pub critical_path: Vec<RoomId>,
    pub entrance: Option<RoomId>,
    pub exit: Option<RoomId>,
}

impl Level {
    /// Creates an empty level of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            grid: Grid::new(width, height),
            rooms: Vec::new(),
            corridors: Vec::new(),
            corridor_cells: CellMask::new(width, height),
            doors: Vec::new(),
            keys: Vec::new(),
            critical_path: Vec::new(),
            entrance: None,
            exit: None,
        }
    }

    /// Gets a room by id.
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id as usize)
    }

    pub fn entrance_room(&self) -> Option<&Room> {
        self.entrance.and_then(|id| self.room(id))
    }

    pub fn exit_room(&self) -> Option<&Room> {
        self.exit.and_then(|id| self.room(id))
    }

    /// Iterates the rooms holding the given role.
    pub fn rooms_of_type(&self, room_type: RoomType) -> impl Iterator<Item = &Room> + '_ {
        self.rooms.iter().filter(move |room| room.room_type == room_type)
    }

    /// Gets a door by id.
    pub fn door(&self, id: DoorId) -> Option<&Door> {
        self.doors.get(id as usize)
    }

    /// Finds the key that opens a door.
    pub fn key_for(&self, door: DoorId) -> Option<&KeyPlacement> {
        self.keys.iter().find(|key| key.door == door)
    }
}

/// Outcome of a generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    pub level: Level,
    /// Whether the returned level passed validation
    pub is_valid: bool,
    /// Attempts run, including the returned one
    pub attempts_used: u32,
    /// Seed of the attempt that produced `level`
    pub seed_used: u64,
    /// Validation failure of the returned level, if any
    pub failure: Option<String>,
}

/// One attempt of the layout pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutGenerator;

impl LayoutGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator<Level> for LayoutGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut dyn RandomSource) -> DelveResult<Level> {
        let mut level = Level::new(config.level_width, config.level_height);

        let target_rooms = rng.next_int(config.min_room_count as i32, config.max_room_count as i32 + 1) as u32;
        let root = Rect::new(0, 0, config.level_width as i32, config.level_height as i32);
        let mut tree = SpacePartitioner::from_config(config, target_rooms).partition(root, rng);

        RoomPlacer::from_config(config).place_in_tree(&mut tree, rng);
        let mut rooms = tree.into_rooms();
        enforce_room_limit(&mut rooms, config.max_room_count as usize, rng);
        for room in &rooms {
            carve_room(&mut level.grid, room);
        }

        level.corridors =
            GraphConnector::from_config(config).connect(&mut level.grid, &mut level.corridor_cells, &mut rooms, rng);

        let topology = TopologyAnalyzer::from_config(config).analyze(&mut rooms, rng);

        let furnishing =
            PostProcessor::from_config(config).process(&mut level.grid, &mut level.corridor_cells, &mut rooms, rng);

        debug!(
            "Attempt produced {} rooms, {} corridors, {} doors",
            rooms.len(),
            level.corridors.len(),
            furnishing.doors.len()
        );

        level.rooms = rooms;
        level.doors = furnishing.doors;
        level.keys = furnishing.keys;
        level.critical_path = topology.critical_path;
        level.entrance = topology.entrance;
        level.exit = topology.exit;
        Ok(level)
    }

    fn validate(&self, level: &Level, config: &GenerationConfig) -> DelveResult<()> {
        LevelValidator::new(config.min_room_count as usize).check(level)?;
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "LayoutGenerator"
    }
}

/// Runs the layout pipeline with validation and retries.
#[derive(Debug, Clone, Default)]
pub struct DungeonGenerator {
    layout: LayoutGenerator,
}

impl DungeonGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a level, retrying failed attempts according to the
    /// configuration's [`RetryPolicy`].
    ///
    /// Configuration errors are returned before any attempt runs. When every
    /// attempt fails validation, the last attempt is returned with
    /// `is_valid = false`.
    pub fn generate(&self, config: &GenerationConfig) -> DelveResult<GeneratedLevel> {
        config.validate()?;
        info!(
            "Generating {}x{} level with seed {} using {}",
            config.level_width,
            config.level_height,
            config.seed,
            self.layout.generator_type()
        );

        let mut last_attempt = None;
        for attempt in 0..config.max_retries {
            let seed = match config.retry_policy {
                RetryPolicy::FreshRandomness => derive_attempt_seed(config.seed, attempt),
                RetryPolicy::Deterministic => config.seed,
            };
            let mut rng = SeededRandom::new(seed);
            let level = self.layout.generate(config, &mut rng)?;

            match self.layout.validate(&level, config) {
                Ok(()) => {
                    info!(
                        "Generated level with {} rooms after {} attempt(s)",
                        level.rooms.len(),
                        attempt + 1
                    );
                    return Ok(GeneratedLevel {
                        level,
                        is_valid: true,
                        attempts_used: attempt + 1,
                        seed_used: seed,
                        failure: None,
                    });
                }
                Err(DelveError::Validation(failure)) => {
                    warn!("Attempt {} (seed {}) rejected: {}", attempt + 1, seed, failure);
                    last_attempt = Some(GeneratedLevel {
                        level,
                        is_valid: false,
                        attempts_used: attempt + 1,
                        seed_used: seed,
                        failure: Some(failure.to_string()),
                    });
                    if config.retry_policy == RetryPolicy::Deterministic {
                        break;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        let result = last_attempt
            .ok_or_else(|| DelveError::InvalidConfig("max_retries must be at least 1".to_string()))?;
        warn!(
            "Returning invalid level after {} attempt(s): {}",
            result.attempts_used,
            result.failure.as_deref().unwrap_or("unknown failure")
        );
        Ok(result)
    }
}

/// Generates a level with the default [`DungeonGenerator`].
///
/// # Examples
///
/// ```
/// use delve::{generate, GenerationConfig, RoomType};
///
/// let result = generate(&GenerationConfig::for_testing(42)).unwrap();
/// assert!(result.level.rooms.len() >= 4);
/// assert_eq!(result.level.rooms_of_type(RoomType::Entrance).count(), 1);
/// ```
pub fn generate(config: &GenerationConfig) -> DelveResult<GeneratedLevel> {
    DungeonGenerator::new().generate(config)
}
