//! # Generation Module
//!
//! Procedural dungeon layout generation.
//!
//! A level is produced by a fixed pipeline of stages, each living in its own
//! submodule:
//!
//! 1. [`partition`] subdivides the level bounds with binary space partitioning
//! 2. [`rooms`] places one room (rectangle, L-shape or template) per leaf
//! 3. [`corridors`] connects the rooms with a minimum spanning tree of corridors
//! 4. [`topology`] computes room distances, the critical path and room roles
//! 5. [`postprocess`] smooths the layout, repairs connectivity and places
//!    walls, doors, features and keys
//! 6. [`validation`] accepts the attempt or asks [`dungeon`] to retry
//!
//! This module holds the configuration and the room/door data model they share.

pub mod corridors;
pub mod dungeon;
pub mod partition;
pub mod postprocess;
pub mod rooms;
pub mod topology;
pub mod validation;

pub use corridors::*;
pub use dungeon::*;
pub use partition::*;
pub use postprocess::*;
pub use rooms::*;
pub use topology::*;
pub use validation::*;

use crate::{config, DelveError, DelveResult, Position, RandomSource, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier of a room within one generated level (its index).
pub type RoomId = u32;

/// Stable identifier of a door within one generated level (its index).
pub type DoorId = u32;

/// How corridors between connected rooms are carved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorridorStyle {
    /// Two axis-aligned segments, corner side chosen at random
    Straight,
    /// Two axis-aligned segments, horizontal first, with a widened corner
    LShaped,
    /// Biased random walk towards the target
    Organic,
    /// Weighted random choice among the other styles, per corridor
    Random,
}

/// What the retry loop does after a failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Each attempt gets its own seed derived from the base seed
    FreshRandomness,
    /// Every attempt reuses the base seed; the first failure is final
    Deterministic,
}

/// Configuration for procedural generation.
///
/// Every tunable of the pipeline lives here; generation is a pure function of
/// this value. Use [`GenerationConfig::validate`] (called automatically by
/// [`generate`]) to reject degenerate inputs before any work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Level width in cells
    pub level_width: u32,
    /// Level height in cells
    pub level_height: u32,
    /// Minimum room side length
    pub min_room_size: u32,
    /// Maximum room side length
    pub max_room_size: u32,
    /// Minimum BSP leaf side length
    pub min_leaf_size: u32,
    /// Empty margin kept between a room and the edge of its leaf
    pub room_padding: u32,
    /// Corridor width in cells
    pub corridor_width: u32,
    /// Corridor carving style
    pub corridor_style: CorridorStyle,
    /// Probability that an organic corridor step wanders (0.0 to 1.0)
    pub winding_factor: f64,
    /// Minimum number of rooms an accepted level must have
    pub min_room_count: u32,
    /// Maximum number of rooms per level
    pub max_room_count: u32,
    /// Whether rooms may be stamped from templates
    pub use_room_templates: bool,
    /// Templates available for stamping
    pub templates: Vec<RoomTemplate>,
    /// Probability of trying a template for a leaf (0.0 to 1.0)
    pub template_probability: f64,
    /// Probability of trying an L-shaped room for a leaf (0.0 to 1.0)
    pub l_shape_probability: f64,
    /// Smallest L-shape leg thickness as a fraction of the stem
    pub min_leg_ratio: f64,
    /// Largest L-shape leg thickness as a fraction of the stem
    pub max_leg_ratio: f64,
    /// Fraction of rooms that become treasure rooms
    pub treasure_chance: f64,
    /// Fraction of rooms that become shops
    pub shop_chance: f64,
    /// Fraction of rooms that become secret rooms
    pub secret_chance: f64,
    /// Fraction of rooms that become challenge rooms
    pub challenge_chance: f64,
    /// Whether to designate a boss room.
    ///
    /// A boss room needs a room of at least 10×10 at least half the room
    /// count away from the entrance. With the default `max_room_size` of 12
    /// such rooms are rare and most levels have no boss; raise
    /// `max_room_size` and `min_leaf_size` to make one likely.
    pub include_boss_room: bool,
    /// Whether special rooms may receive locked doors with keys
    pub use_key_system: bool,
    /// Cellular automata smoothing passes
    pub smoothing_iterations: u32,
    /// Whether to carve extra corridors that create loops
    pub loop_corridors: bool,
    /// Extra loop corridors as a fraction of the room count
    pub loop_corridor_ratio: f64,
    /// Probability that a large normal room receives water or obstacles
    pub feature_chance: f64,
    /// Force the entrance to this room id
    pub entrance_override: Option<RoomId>,
    /// Force the exit to this room id
    pub exit_override: Option<RoomId>,
    /// Maximum generation attempts
    pub max_retries: u32,
    /// Randomness used by retries
    pub retry_policy: RetryPolicy,
    /// Random seed for reproducible generation
    pub seed: u64,
}

impl GenerationConfig {
    /// Creates a default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(7);
    /// assert_eq!(config.seed, 7);
    /// assert!(config.max_room_size >= config.min_room_size);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            level_width: config::DEFAULT_LEVEL_WIDTH,
            level_height: config::DEFAULT_LEVEL_HEIGHT,
            min_room_size: 5,
            max_room_size: 12,
            min_leaf_size: 10,
            room_padding: 1,
            corridor_width: 1,
            corridor_style: CorridorStyle::Random,
            winding_factor: 0.3,
            min_room_count: 6,
            max_room_count: 12,
            use_room_templates: false,
            templates: RoomTemplate::builtin(),
            template_probability: 0.15,
            l_shape_probability: 0.25,
            min_leg_ratio: 0.4,
            max_leg_ratio: 0.7,
            treasure_chance: 0.1,
            shop_chance: 0.05,
            secret_chance: 0.05,
            challenge_chance: 0.05,
            include_boss_room: true,
            use_key_system: true,
            smoothing_iterations: 2,
            loop_corridors: false,
            loop_corridor_ratio: 0.2,
            feature_chance: 0.3,
            entrance_override: None,
            exit_override: None,
            max_retries: config::DEFAULT_MAX_RETRIES,
            retry_policy: RetryPolicy::FreshRandomness,
            seed,
        }
    }

    /// Creates a configuration for testing with smaller, simpler levels.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            level_width: 40,
            level_height: 40,
            min_room_count: 4,
            max_room_count: 6,
            corridor_style: CorridorStyle::Straight,
            feature_chance: 0.0,
            ..Self::new(seed)
        }
    }

    /// Creates a configuration for large levels using every room shape.
    pub fn for_detailed_generation(seed: u64) -> Self {
        Self {
            level_width: 120,
            level_height: 80,
            max_room_size: 16,
            min_leaf_size: 12,
            min_room_count: 10,
            max_room_count: 24,
            use_room_templates: true,
            template_probability: 0.25,
            l_shape_probability: 0.3,
            treasure_chance: 0.15,
            shop_chance: 0.08,
            secret_chance: 0.08,
            challenge_chance: 0.08,
            loop_corridors: true,
            smoothing_iterations: 3,
            ..Self::new(seed)
        }
    }

    /// Rejects degenerate configurations with a descriptive error.
    ///
    /// Inputs are never clamped: a configuration that cannot produce a
    /// sensible level is a caller mistake.
    pub fn validate(&self) -> DelveResult<()> {
        let invalid = |msg: String| Err(DelveError::InvalidConfig(msg));

        if self.min_room_size == 0 {
            return invalid("min_room_size must be at least 1".to_string());
        }
        if self.min_room_size > self.max_room_size {
            return invalid(format!(
                "min_room_size ({}) exceeds max_room_size ({})",
                self.min_room_size, self.max_room_size
            ));
        }
        if self.min_room_count == 0 {
            return invalid("min_room_count must be at least 1".to_string());
        }
        if self.min_room_count > self.max_room_count {
            return invalid(format!(
                "min_room_count ({}) exceeds max_room_count ({})",
                self.min_room_count, self.max_room_count
            ));
        }
        if self.room_padding == 0 {
            return invalid("room_padding must be at least 1".to_string());
        }
        if self.level_width < 2 * self.min_leaf_size {
            return invalid(format!(
                "level_width ({}) is smaller than twice min_leaf_size ({})",
                self.level_width, self.min_leaf_size
            ));
        }
        if self.level_height < 2 * self.min_leaf_size {
            return invalid(format!(
                "level_height ({}) is smaller than twice min_leaf_size ({})",
                self.level_height, self.min_leaf_size
            ));
        }
        if self.min_leaf_size < self.min_room_size + 2 * self.room_padding {
            return invalid(format!(
                "min_leaf_size ({}) cannot hold a room of min_room_size ({}) with padding {}",
                self.min_leaf_size, self.min_room_size, self.room_padding
            ));
        }
        if self.corridor_width == 0 {
            return invalid("corridor_width must be at least 1".to_string());
        }
        if self.max_retries == 0 {
            return invalid("max_retries must be at least 1".to_string());
        }

        for (name, value) in [
            ("winding_factor", self.winding_factor),
            ("template_probability", self.template_probability),
            ("l_shape_probability", self.l_shape_probability),
            ("treasure_chance", self.treasure_chance),
            ("shop_chance", self.shop_chance),
            ("secret_chance", self.secret_chance),
            ("challenge_chance", self.challenge_chance),
            ("loop_corridor_ratio", self.loop_corridor_ratio),
            ("feature_chance", self.feature_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }

        if !(self.min_leg_ratio > 0.0 && self.max_leg_ratio <= 1.0)
            || self.min_leg_ratio > self.max_leg_ratio
        {
            return invalid(format!(
                "leg ratio range [{}, {}] must be ordered and within (0, 1]",
                self.min_leg_ratio, self.max_leg_ratio
            ));
        }

        if self.use_room_templates {
            if self.templates.is_empty() {
                return invalid("use_room_templates is set but no templates were supplied".to_string());
            }
            for template in &self.templates {
                template.validate()?;
            }
        }

        if let (Some(entrance), Some(exit)) = (self.entrance_override, self.exit_override) {
            if entrance == exit {
                return invalid(format!("entrance and exit overrides both name room {entrance}"));
            }
        }

        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Role of a room in the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    /// Standard room with no special properties
    Normal,
    /// Where the player starts
    Entrance,
    /// Where the level is left
    Exit,
    /// Room containing treasure or valuable items
    Treasure,
    /// Shop or merchant room
    Shop,
    /// Room with a boss or strong enemy
    Boss,
    /// Room holding an optional combat or puzzle challenge
    Challenge,
    /// Secret room hidden from normal exploration
    Secret,
}

impl RoomType {
    /// Returns true for every role other than [`RoomType::Normal`].
    pub fn is_special(self) -> bool {
        self != RoomType::Normal
    }
}

/// Flags attached to rooms by the topology analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomTag {
    /// Room lies on the shortest entrance-to-exit route
    CriticalPath,
    /// Room has a single connection
    DeadEnd,
}

/// Footprint of a room inside its bounding rectangle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomShape {
    /// The whole bounding rectangle is floor
    Rectangle,
    /// A stem rectangle with a smaller leg attached to one side
    LShape { stem: Rect, leg: Rect },
    /// A stamped pattern; `mask` covers the bounds row-major
    Template { name: String, scale: u32, mask: Vec<bool> },
}

/// A room of the generated level.
///
/// Rooms are created by the room placer, receive their roles and distances
/// from the topology analysis, and their doors from post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier for this room (index into the room list)
    pub id: RoomId,
    /// Bounding rectangle of the room's floor
    pub bounds: Rect,
    /// Footprint within the bounds
    pub shape: RoomShape,
    /// Anchor cell corridors are routed to; always covered by the shape
    pub center: Position,
    /// Type/purpose of this room
    pub room_type: RoomType,
    /// Whether this is the largest room of the level
    pub is_main_room: bool,
    /// Room-graph hops from the entrance, `None` while unknown or unreachable
    pub distance_from_start: Option<u32>,
    /// Topology flags
    pub tags: BTreeSet<RoomTag>,
    /// Doors owned by this room
    pub doors: Vec<DoorId>,
    /// Rooms joined to this one by a corridor
    pub connections: Vec<RoomId>,
}

impl Room {
    /// Creates a new room.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Position, Rect, Room, RoomShape, RoomType};
    ///
    /// let room = Room::new(1, Rect::new(5, 5, 10, 8), RoomShape::Rectangle);
    /// assert_eq!(room.id, 1);
    /// assert_eq!(room.center, Position::new(10, 9));
    /// assert_eq!(room.room_type, RoomType::Normal);
    /// ```
    pub fn new(id: RoomId, bounds: Rect, shape: RoomShape) -> Self {
        let mut room = Self {
            id,
            bounds,
            shape,
            center: bounds.center(),
            room_type: RoomType::Normal,
            is_main_room: false,
            distance_from_start: None,
            tags: BTreeSet::new(),
            doors: Vec::new(),
            connections: Vec::new(),
        };
        room.center = room.anchor();
        room
    }

    fn anchor(&self) -> Position {
        match &self.shape {
            RoomShape::Rectangle => self.bounds.center(),
            RoomShape::LShape { stem, .. } => stem.center(),
            RoomShape::Template { .. } => {
                let target = self.bounds.center();
                self.cells()
                    .min_by_key(|pos| (pos.manhattan_distance(target), pos.y, pos.x))
                    .unwrap_or(target)
            }
        }
    }

    /// Width of the bounding rectangle.
    pub fn width(&self) -> u32 {
        self.bounds.width as u32
    }

    /// Height of the bounding rectangle.
    pub fn height(&self) -> u32 {
        self.bounds.height as u32
    }

    /// Returns true if both bounding dimensions are at least `size`.
    pub fn fits(&self, size: u32) -> bool {
        self.width() >= size && self.height() >= size
    }

    /// Checks if the room's footprint covers a position.
    pub fn covers(&self, pos: Position) -> bool {
        if !self.bounds.contains(pos) {
            return false;
        }
        match &self.shape {
            RoomShape::Rectangle => true,
            RoomShape::LShape { stem, leg } => stem.contains(pos) || leg.contains(pos),
            RoomShape::Template { mask, .. } => {
                let local = pos - self.bounds.top_left();
                let idx = (local.y * self.bounds.width + local.x) as usize;
                mask.get(idx).copied().unwrap_or(false)
            }
        }
    }

    /// Iterates the cells covered by the room's footprint.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.bounds.positions().filter(move |&pos| self.covers(pos))
    }

    /// Number of cells covered by the footprint.
    pub fn area(&self) -> u32 {
        match &self.shape {
            RoomShape::Rectangle => self.bounds.area(),
            _ => self.cells().count() as u32,
        }
    }

    /// Checks if this room's bounds, grown by `padding`, overlap another room's.
    pub fn overlaps(&self, other: &Room, padding: i32) -> bool {
        self.bounds.inflate(padding).intersects(&other.bounds.inflate(padding))
    }

    /// Returns true if the room carries the given tag.
    pub fn has_tag(&self, tag: RoomTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Adds a connection to another room.
    pub fn add_connection(&mut self, room_id: RoomId) {
        if !self.connections.contains(&room_id) {
            self.connections.push(room_id);
        }
    }

    /// Returns true if a corridor joins this room to `room_id`.
    pub fn is_connected_to(&self, room_id: RoomId) -> bool {
        self.connections.contains(&room_id)
    }
}

/// A door on a room perimeter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Unique identifier for this door (index into the door list)
    pub id: DoorId,
    /// Grid cell of the door
    pub position: Position,
    /// Room whose perimeter the door sits on
    pub room: RoomId,
    /// Whether a key is needed to pass
    pub is_locked: bool,
    /// Whether the door is concealed (secret rooms)
    pub is_hidden: bool,
    /// Token matching the key that opens this door
    pub key_id: Uuid,
}

/// A key and the locked door it opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPlacement {
    /// Token shared with the door's `key_id`
    pub key_id: Uuid,
    /// Door this key opens
    pub door: DoorId,
    /// Floor cell the key lies on
    pub position: Position,
    /// Room holding the key
    pub room: RoomId,
    /// Room behind the locked door
    pub lock_room: RoomId,
}

/// A room-graph edge realised as a carved corridor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    pub from: RoomId,
    pub to: RoomId,
    /// Concrete style used for carving (never [`CorridorStyle::Random`])
    pub style: CorridorStyle,
    /// Whether the edge belongs to the minimum spanning tree
    pub spanning: bool,
}

/// Trait for procedural generators.
///
/// A generator turns a configuration and a random source into content, and
/// can check content it (or anyone else) produced.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random source.
    fn generate(&self, config: &GenerationConfig, rng: &mut dyn RandomSource) -> DelveResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> DelveResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_creation() {
        let config = GenerationConfig::new(12345);
        assert_eq!(config.seed, 12345);
        assert!(config.min_room_size >= 3);
        assert!(config.max_room_size >= config.min_room_size);
        assert!(config.min_room_count <= config.max_room_count);
        assert!(config.validate().is_ok());
        assert!(GenerationConfig::for_testing(1).validate().is_ok());
        assert!(GenerationConfig::for_detailed_generation(1).validate().is_ok());
    }

    #[test]
    fn test_config_rejects_inverted_room_sizes() {
        let config = GenerationConfig {
            min_room_size: 9,
            max_room_size: 6,
            ..GenerationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_room_size"));
    }

    #[test]
    fn test_config_rejects_small_level() {
        let config = GenerationConfig {
            level_width: 15,
            min_leaf_size: 10,
            ..GenerationConfig::default()
        };
        assert!(matches!(config.validate(), Err(DelveError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_missing_templates() {
        let config = GenerationConfig {
            use_room_templates: true,
            templates: Vec::new(),
            ..GenerationConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("templates"));
    }

    #[test]
    fn test_config_rejects_bad_probabilities() {
        let config = GenerationConfig {
            treasure_chance: 1.5,
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GenerationConfig {
            min_leg_ratio: 0.8,
            max_leg_ratio: 0.5,
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_unusable_leaf_size() {
        let config = GenerationConfig {
            min_room_size: 9,
            min_leaf_size: 10,
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_conflicting_overrides() {
        let config = GenerationConfig {
            entrance_override: Some(2),
            exit_override: Some(2),
            ..GenerationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{ "seed": 9, "level_width": 50, "corridor_style": "Organic" }"#)
                .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.level_width, 50);
        assert_eq!(config.corridor_style, CorridorStyle::Organic);
        assert_eq!(config.level_height, GenerationConfig::default().level_height);
    }

    #[test]
    fn test_room_geometry() {
        let room = Room::new(1, Rect::new(5, 5, 10, 8), RoomShape::Rectangle);

        assert_eq!(room.width(), 10);
        assert_eq!(room.height(), 8);
        assert_eq!(room.area(), 80);
        assert!(room.fits(8));
        assert!(!room.fits(9));
        assert!(room.covers(Position::new(5, 5)));
        assert!(room.covers(Position::new(14, 12)));
        assert!(!room.covers(Position::new(15, 12)));
    }

    #[test]
    fn test_l_shaped_room_footprint() {
        let stem = Rect::new(0, 0, 6, 6);
        let leg = Rect::new(6, 0, 3, 3);
        let room = Room::new(0, stem.union(&leg), RoomShape::LShape { stem, leg });

        assert_eq!(room.area(), 36 + 9);
        assert_eq!(room.center, Position::new(3, 3));
        assert!(room.covers(Position::new(7, 1)));
        assert!(!room.covers(Position::new(7, 4)));
    }

    #[test]
    fn test_template_room_center_is_covered() {
        // A ring: the bounding-box center is hollow
        let mask = vec![
            true, true, true, //
            true, false, true, //
            true, true, true, //
        ];
        let room = Room::new(
            0,
            Rect::new(2, 2, 3, 3),
            RoomShape::Template { name: "ring".to_string(), scale: 1, mask },
        );
        assert!(room.covers(room.center));
        assert_eq!(room.area(), 8);
    }

    #[test]
    fn test_room_overlap_with_padding() {
        let room1 = Room::new(0, Rect::new(0, 0, 5, 5), RoomShape::Rectangle);
        let room2 = Room::new(1, Rect::new(7, 0, 5, 5), RoomShape::Rectangle);

        assert!(!room1.overlaps(&room2, 0));
        assert!(!room1.overlaps(&room2, 1));
        assert!(room1.overlaps(&room2, 2));
    }

    #[test]
    fn test_room_connections() {
        let mut room = Room::new(1, Rect::new(5, 5, 10, 8), RoomShape::Rectangle);
        assert!(room.connections.is_empty());

        room.add_connection(2);
        room.add_connection(3);
        room.add_connection(2);
        assert_eq!(room.connections, vec![2, 3]);
        assert!(room.is_connected_to(3));
        assert!(!room.is_connected_to(4));
    }
}
