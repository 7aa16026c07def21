//! # Room Placement
//!
//! Turns BSP leaves into rooms. Each leaf tries, in order, a stamped template,
//! an L-shape and finally a plain rectangle; a shape that does not fit falls
//! through to the next one, so any leaf large enough for the minimum room
//! size always yields a room.

use crate::{
    random, BspNode, CellState, DelveError, DelveResult, Direction, GenerationConfig, Grid,
    RandomSource, Rect, Room, RoomId, RoomShape,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Largest integer factor a template is scaled up by.
const MAX_TEMPLATE_SCALE: i32 = 2;

/// A predefined room footprint.
///
/// Patterns are rows of characters where `'.'` marks floor and any other
/// character marks empty space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomTemplate {
    pub name: String,
    pub pattern: Vec<String>,
}

impl RoomTemplate {
    /// Creates a template from pattern rows.
    pub fn new(name: impl Into<String>, pattern: &[&str]) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.iter().map(|row| row.to_string()).collect(),
        }
    }

    /// The templates shipped with the crate.
    pub fn builtin() -> Vec<RoomTemplate> {
        vec![
            RoomTemplate::new(
                "cross",
                &[
                    "  ...  ", //
                    "  ...  ", //
                    ".......", //
                    ".......", //
                    ".......", //
                    "  ...  ", //
                    "  ...  ", //
                ],
            ),
            RoomTemplate::new(
                "ring",
                &[
                    ".......", //
                    ".......", //
                    "..   ..", //
                    "..   ..", //
                    "..   ..", //
                    ".......", //
                    ".......", //
                ],
            ),
            RoomTemplate::new(
                "diamond",
                &[
                    "   .   ", //
                    "  ...  ", //
                    " ..... ", //
                    ".......", //
                    " ..... ", //
                    "  ...  ", //
                    "   .   ", //
                ],
            ),
            RoomTemplate::new(
                "pillared_hall",
                &[
                    ".........", //
                    ".........", //
                    "..#...#..", //
                    ".........", //
                    "..#...#..", //
                    ".........", //
                    ".........", //
                ],
            ),
        ]
    }

    /// Checks that the pattern is rectangular and has at least one floor cell.
    pub fn validate(&self) -> DelveResult<()> {
        let Some(first) = self.pattern.first() else {
            return Err(DelveError::InvalidConfig(format!(
                "template '{}' has an empty pattern",
                self.name
            )));
        };
        let width = first.chars().count();
        if self.pattern.iter().any(|row| row.chars().count() != width) {
            return Err(DelveError::InvalidConfig(format!(
                "template '{}' has rows of different lengths",
                self.name
            )));
        }
        if !self.pattern.iter().any(|row| row.contains('.')) {
            return Err(DelveError::InvalidConfig(format!(
                "template '{}' has no floor cells",
                self.name
            )));
        }
        Ok(())
    }

    /// Floor mask with empty border rows and columns trimmed away.
    ///
    /// Returns `(width, height, mask)` with the mask stored row-major.
    pub fn trimmed_mask(&self) -> (i32, i32, Vec<bool>) {
        let rows: Vec<Vec<bool>> = self
            .pattern
            .iter()
            .map(|row| row.chars().map(|ch| ch == '.').collect())
            .collect();

        let floor_rows: Vec<usize> = (0..rows.len()).filter(|&y| rows[y].contains(&true)).collect();
        let (Some(&top), Some(&bottom)) = (floor_rows.first(), floor_rows.last()) else {
            return (0, 0, Vec::new());
        };
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let floor_columns: Vec<usize> = (0..columns)
            .filter(|&x| rows.iter().any(|row| row.get(x).copied().unwrap_or(false)))
            .collect();
        let (Some(&left), Some(&right)) = (floor_columns.first(), floor_columns.last()) else {
            return (0, 0, Vec::new());
        };

        let mut mask = Vec::with_capacity((bottom - top + 1) * (right - left + 1));
        for row in &rows[top..=bottom] {
            for x in left..=right {
                mask.push(row.get(x).copied().unwrap_or(false));
            }
        }
        ((right - left + 1) as i32, (bottom - top + 1) as i32, mask)
    }
}

/// Scales a row-major mask by an integer factor.
fn scale_mask(width: i32, height: i32, mask: &[bool], scale: i32) -> Vec<bool> {
    let mut scaled = Vec::with_capacity((width * height * scale * scale) as usize);
    for y in 0..height * scale {
        for x in 0..width * scale {
            scaled.push(mask[((y / scale) * width + x / scale) as usize]);
        }
    }
    scaled
}

/// Places one room per BSP leaf.
#[derive(Debug, Clone)]
pub struct RoomPlacer {
    pub min_room_size: i32,
    pub max_room_size: i32,
    /// Empty cells kept between a room and its leaf edge
    pub padding: i32,
    pub l_shape_probability: f64,
    pub min_leg_ratio: f64,
    pub max_leg_ratio: f64,
    pub template_probability: f64,
    /// Templates to stamp; empty disables templates
    pub templates: Vec<RoomTemplate>,
}

impl RoomPlacer {
    /// Creates a room placer from the configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            min_room_size: config.min_room_size as i32,
            max_room_size: config.max_room_size as i32,
            padding: config.room_padding as i32,
            l_shape_probability: config.l_shape_probability,
            min_leg_ratio: config.min_leg_ratio,
            max_leg_ratio: config.max_leg_ratio,
            template_probability: config.template_probability,
            templates: if config.use_room_templates {
                config.templates.clone()
            } else {
                Vec::new()
            },
        }
    }

    /// Places a room in every leaf of the tree. Room ids follow leaf order.
    ///
    /// Returns the number of rooms placed.
    pub fn place_in_tree(&self, tree: &mut BspNode, rng: &mut dyn RandomSource) -> usize {
        let mut next_id: RoomId = 0;
        for leaf in tree.leaves_mut() {
            leaf.room = self.place(leaf.bounds, next_id, rng);
            if leaf.room.is_some() {
                next_id += 1;
            }
        }
        debug!("Placed {} rooms", next_id);
        next_id as usize
    }

    /// Attempts to place a room inside `leaf`.
    ///
    /// Returns `None` only when the leaf minus padding is smaller than the
    /// minimum room size.
    pub fn place(&self, leaf: Rect, id: RoomId, rng: &mut dyn RandomSource) -> Option<Room> {
        let area = leaf.inflate(-self.padding);
        if area.width < self.min_room_size || area.height < self.min_room_size {
            return None;
        }

        if !self.templates.is_empty() && rng.chance(self.template_probability) {
            if let Some(room) = self.place_template(area, id, rng) {
                return Some(room);
            }
        }

        if rng.chance(self.l_shape_probability) {
            if let Some(room) = self.place_l_shape(area, id, rng) {
                return Some(room);
            }
        }

        Some(self.place_rectangle(area, id, rng))
    }

    /// Picks a side length in `[min_room_size, min(cap, max_room_size)]`.
    fn side_length(&self, cap: i32, rng: &mut dyn RandomSource) -> i32 {
        let upper = cap.min(self.max_room_size).max(self.min_room_size);
        rng.next_int(self.min_room_size, upper + 1)
    }

    /// Random rectangle of `width × height` positioned inside `area`.
    fn position_in(area: Rect, width: i32, height: i32, rng: &mut dyn RandomSource) -> Rect {
        let x = area.x + rng.next_int(0, area.width - width + 1);
        let y = area.y + rng.next_int(0, area.height - height + 1);
        Rect::new(x, y, width, height)
    }

    /// Places a plain rectangular room. Always succeeds for a valid area.
    pub fn place_rectangle(&self, area: Rect, id: RoomId, rng: &mut dyn RandomSource) -> Room {
        let width = self.side_length(area.width, rng);
        let height = self.side_length(area.height, rng);
        let bounds = Self::position_in(area, width, height, rng);
        Room::new(id, bounds, RoomShape::Rectangle)
    }

    /// Places an L-shaped room: a stem rectangle plus a leg attached flush to
    /// one end of a side that has free space.
    pub fn place_l_shape(&self, area: Rect, id: RoomId, rng: &mut dyn RandomSource) -> Option<Room> {
        // Leave some of the area free so a leg has somewhere to go
        let stem_width = self.side_length((area.width * 3 / 4).max(self.min_room_size), rng);
        let stem_height = self.side_length((area.height * 3 / 4).max(self.min_room_size), rng);
        let stem = Self::position_in(area, stem_width, stem_height, rng);

        let sides: Vec<(Direction, i32)> = [
            (Direction::North, stem.y - area.y),
            (Direction::South, area.bottom() - stem.bottom()),
            (Direction::West, stem.x - area.x),
            (Direction::East, area.right() - stem.right()),
        ]
        .into_iter()
        .filter(|&(_, space)| space >= 1)
        .collect();

        let &(side, space) = random::choose(rng, &sides)?;

        let cross = match side {
            Direction::North | Direction::South => stem.width,
            Direction::East | Direction::West => stem.height,
        };
        let ratio = rng.next_range_f64(self.min_leg_ratio, self.max_leg_ratio);
        let thickness = ((cross as f64 * ratio).round() as i32).clamp(1, (cross - 1).max(1));
        let min_length = (self.min_room_size / 2).clamp(1, space);
        let length = rng.next_int(min_length, space + 1);
        let flush_start = rng.chance(0.5);

        let leg = match side {
            Direction::North | Direction::South => {
                let x = if flush_start { stem.x } else { stem.right() - thickness };
                let y = if side == Direction::North {
                    stem.y - length
                } else {
                    stem.bottom()
                };
                Rect::new(x, y, thickness, length)
            }
            Direction::East | Direction::West => {
                let y = if flush_start { stem.y } else { stem.bottom() - thickness };
                let x = if side == Direction::West {
                    stem.x - length
                } else {
                    stem.right()
                };
                Rect::new(x, y, length, thickness)
            }
        };

        let bounds = stem.union(&leg);
        if !area.contains_rect(&bounds) {
            return None;
        }
        Some(Room::new(id, bounds, RoomShape::LShape { stem, leg }))
    }

    /// Stamps a random template, scaled up when there is space for it.
    pub fn place_template(&self, area: Rect, id: RoomId, rng: &mut dyn RandomSource) -> Option<Room> {
        let template = random::choose(rng, &self.templates)?;
        let (width, height, mask) = template.trimmed_mask();
        if width == 0 || height == 0 {
            return None;
        }

        let scale = (1..=MAX_TEMPLATE_SCALE)
            .rev()
            .find(|&k| {
                let (w, h) = (width * k, height * k);
                w <= area.width
                    && h <= area.height
                    && (k == 1 || (w <= self.max_room_size && h <= self.max_room_size))
            })?;

        let bounds = Self::position_in(area, width * scale, height * scale, rng);
        let mask = scale_mask(width, height, &mask, scale);
        Some(Room::new(
            id,
            bounds,
            RoomShape::Template {
                name: template.name.clone(),
                scale: scale as u32,
                mask,
            },
        ))
    }
}

/// Carves a room's footprint into the grid as floor.
pub fn carve_room(grid: &mut Grid, room: &Room) {
    for cell in room.cells() {
        grid.carve(cell, CellState::Floor);
    }
}

/// Drops random rooms until at most `max_rooms` remain, then re-packs ids so
/// that every room's id equals its index.
pub fn enforce_room_limit(rooms: &mut Vec<Room>, max_rooms: usize, rng: &mut dyn RandomSource) {
    while rooms.len() > max_rooms {
        if let Some(idx) = rng.next_index(rooms.len()) {
            rooms.remove(idx);
        }
    }
    for (idx, room) in rooms.iter_mut().enumerate() {
        room.id = idx as RoomId;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Position, SeededRandom};

    fn placer() -> RoomPlacer {
        RoomPlacer::from_config(&GenerationConfig::default())
    }

    #[test]
    fn test_rectangle_fits_inside_padded_leaf() {
        let placer = placer();
        let leaf = Rect::new(10, 10, 16, 12);
        for seed in 0..50 {
            let mut rng = SeededRandom::new(seed);
            let room = placer.place_rectangle(leaf.inflate(-1), 0, &mut rng);
            assert!(leaf.inflate(-1).contains_rect(&room.bounds));
            assert!(room.width() >= 5 && room.width() <= 12);
            assert!(room.height() >= 5 && room.height() <= 10);
        }
    }

    #[test]
    fn test_leaf_too_small_yields_no_room() {
        let placer = placer();
        let mut rng = SeededRandom::new(1);
        assert!(placer.place(Rect::new(0, 0, 6, 20), 0, &mut rng).is_none());
        assert!(placer.place(Rect::new(0, 0, 7, 7), 0, &mut rng).is_some());
    }

    #[test]
    fn test_l_shapes_stay_in_leaf() {
        let placer = RoomPlacer {
            l_shape_probability: 1.0,
            ..placer()
        };
        let area = Rect::new(1, 1, 18, 18);
        let mut l_shapes = 0;

        for seed in 0..100 {
            let mut rng = SeededRandom::new(seed);
            if let Some(room) = placer.place_l_shape(area, 3, &mut rng) {
                l_shapes += 1;
                assert!(area.contains_rect(&room.bounds));
                let RoomShape::LShape { stem, leg } = room.shape else {
                    panic!("expected an L-shape");
                };
                assert!(!stem.intersects(&leg));
                assert!(room.covers(room.center));
                assert_eq!(room.area(), stem.area() + leg.area());
            }
        }
        assert!(l_shapes > 50, "only {l_shapes} L-shapes fit");
    }

    #[test]
    fn test_l_shape_falls_through_without_space() {
        let placer = RoomPlacer {
            l_shape_probability: 1.0,
            ..placer()
        };
        // Area exactly the minimum room size: the stem fills it
        let mut rng = SeededRandom::new(8);
        assert!(placer.place_l_shape(Rect::new(0, 0, 5, 5), 0, &mut rng).is_none());
        let room = placer.place(Rect::new(0, 0, 7, 7), 0, &mut rng).unwrap();
        assert_eq!(room.shape, RoomShape::Rectangle);
    }

    #[test]
    fn test_template_trimming_and_scaling() {
        let template = RoomTemplate::new("blob", &["     ", " ..  ", " .   ", "     "]);
        let (w, h, mask) = template.trimmed_mask();
        assert_eq!((w, h), (2, 2));
        assert_eq!(mask, vec![true, true, true, false]);

        let scaled = scale_mask(w, h, &mask, 2);
        assert_eq!(scaled.len(), 16);
        assert_eq!(scaled.iter().filter(|&&c| c).count(), 12);
    }

    #[test]
    fn test_template_placement() {
        let placer = RoomPlacer {
            template_probability: 1.0,
            templates: vec![RoomTemplate::builtin()[0].clone()],
            ..placer()
        };
        let mut rng = SeededRandom::new(11);

        // 7x7 cross fits once but not scaled
        let room = placer.place(Rect::new(0, 0, 12, 12), 0, &mut rng).unwrap();
        assert!(matches!(room.shape, RoomShape::Template { scale: 1, .. }));
        assert!(room.covers(room.center));

        // Too small for the template: falls through to another shape
        let room = placer.place(Rect::new(0, 0, 8, 8), 1, &mut rng).unwrap();
        assert!(!matches!(room.shape, RoomShape::Template { .. }));
    }

    #[test]
    fn test_template_validation() {
        for template in RoomTemplate::builtin() {
            assert!(template.validate().is_ok(), "{} invalid", template.name);
        }
        assert!(RoomTemplate::new("empty", &[]).validate().is_err());
        assert!(RoomTemplate::new("ragged", &["...", ".."]).validate().is_err());
        assert!(RoomTemplate::new("solid", &["###"]).validate().is_err());
    }

    #[test]
    fn test_carve_room() {
        let mut grid = Grid::new(20, 20);
        let room = Room::new(0, Rect::new(2, 3, 4, 5), RoomShape::Rectangle);
        carve_room(&mut grid, &room);
        assert_eq!(grid.count(CellState::Floor), 20);
        assert!(grid.is(Position::new(2, 3), CellState::Floor));
        assert!(grid.is(Position::new(1, 3), CellState::Empty));
    }

    #[test]
    fn test_room_limit_repacks_ids() {
        let mut rng = SeededRandom::new(2);
        let mut rooms: Vec<Room> = (0..8)
            .map(|i| Room::new(i, Rect::new(i as i32 * 10, 0, 5, 5), RoomShape::Rectangle))
            .collect();

        enforce_room_limit(&mut rooms, 5, &mut rng);
        assert_eq!(rooms.len(), 5);
        for (idx, room) in rooms.iter().enumerate() {
            assert_eq!(room.id, idx as u32);
        }
    }
}
