//! # Topology Analysis
//!
//! Room-graph analysis: breadth-first distances from the entrance, the
//! critical path to the exit, and the designation of room roles.
//!
//! Roles are designated in a fixed order and every step only considers rooms
//! that are still [`RoomType::Normal`], so a room never holds two roles.

use crate::{random, GenerationConfig, RandomSource, Room, RoomId, RoomTag, RoomType};
use log::{debug, warn};
use pathfinding::prelude::bfs;
use std::collections::VecDeque;

/// Minimum side for the entrance and exit rooms.
const ENTRANCE_EXIT_MIN_SIZE: u32 = 8;
/// Minimum side for the boss room.
const BOSS_MIN_SIZE: u32 = 10;
const TREASURE_MIN_SIZE: u32 = 6;
const SHOP_MIN_SIZE: u32 = 8;
const CHALLENGE_MIN_SIZE: u32 = 8;
const SECRET_MIN_SIZE: u32 = 5;
/// Minimum room-graph distance from the entrance for secret rooms.
const SECRET_MIN_DISTANCE: u32 = 2;
/// How many of the best candidates a random role pick chooses among.
const TOP_CANDIDATES: usize = 3;

/// Result of a topology analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub entrance: Option<RoomId>,
    pub exit: Option<RoomId>,
    pub boss: Option<RoomId>,
    /// Rooms from entrance to exit, inclusive
    pub critical_path: Vec<RoomId>,
}

/// Designates room roles from the room graph.
#[derive(Debug, Clone)]
pub struct TopologyAnalyzer {
    pub entrance_override: Option<RoomId>,
    pub exit_override: Option<RoomId>,
    pub include_boss_room: bool,
    pub treasure_chance: f64,
    pub shop_chance: f64,
    pub secret_chance: f64,
    pub challenge_chance: f64,
}

impl TopologyAnalyzer {
    /// Creates an analyzer from the configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            entrance_override: config.entrance_override,
            exit_override: config.exit_override,
            include_boss_room: config.include_boss_room,
            treasure_chance: config.treasure_chance,
            shop_chance: config.shop_chance,
            secret_chance: config.secret_chance,
            challenge_chance: config.challenge_chance,
        }
    }

    /// Analyzes the room graph, writing roles, distances and tags into `rooms`.
    ///
    /// Room ids must equal their indices.
    pub fn analyze(&self, rooms: &mut [Room], rng: &mut dyn RandomSource) -> Topology {
        for room in rooms.iter_mut() {
            room.room_type = RoomType::Normal;
            room.is_main_room = false;
            room.distance_from_start = None;
            room.tags.clear();
        }

        let mut topology = Topology::default();
        let Some(main) = main_room(rooms) else {
            return topology;
        };
        rooms[main as usize].is_main_room = true;

        let entrance = self.pick_entrance(rooms, main, rng);
        rooms[entrance as usize].room_type = RoomType::Entrance;
        topology.entrance = Some(entrance);

        compute_distances(rooms, entrance);

        topology.exit = self.pick_exit(rooms, entrance, rng);
        if let Some(exit) = topology.exit {
            rooms[exit as usize].room_type = RoomType::Exit;
            topology.critical_path = critical_path(rooms, entrance, exit).unwrap_or_default();
            for &id in &topology.critical_path {
                rooms[id as usize].tags.insert(RoomTag::CriticalPath);
            }
        }

        if self.include_boss_room {
            topology.boss = pick_boss(rooms);
            if let Some(boss) = topology.boss {
                rooms[boss as usize].room_type = RoomType::Boss;
            }
        }

        let room_count = rooms.len();
        let count_for = |chance: f64| (room_count as f64 * chance).floor() as usize;
        assign_role(rooms, RoomType::Treasure, count_for(self.treasure_chance), rng, |room| {
            room.fits(TREASURE_MIN_SIZE) && !room.has_tag(RoomTag::CriticalPath)
        });
        assign_role(rooms, RoomType::Shop, count_for(self.shop_chance), rng, |room| {
            room.fits(SHOP_MIN_SIZE)
        });
        assign_role(rooms, RoomType::Secret, count_for(self.secret_chance), rng, |room| {
            room.fits(SECRET_MIN_SIZE)
                && room.distance_from_start.is_some_and(|d| d >= SECRET_MIN_DISTANCE)
        });
        assign_role(rooms, RoomType::Challenge, count_for(self.challenge_chance), rng, |room| {
            room.fits(CHALLENGE_MIN_SIZE)
        });

        for room in rooms.iter_mut() {
            if room.connections.len() == 1 {
                room.tags.insert(RoomTag::DeadEnd);
            }
        }

        debug!(
            "Topology: entrance {:?}, exit {:?}, boss {:?}, critical path {:?}",
            topology.entrance, topology.exit, topology.boss, topology.critical_path
        );
        topology
    }

    fn pick_entrance(&self, rooms: &[Room], main: RoomId, rng: &mut dyn RandomSource) -> RoomId {
        if let Some(id) = self.entrance_override {
            if (id as usize) < rooms.len() {
                return id;
            }
            warn!("Entrance override {} ignored: only {} rooms", id, rooms.len());
        }

        let candidates: Vec<RoomId> = rooms
            .iter()
            .filter(|room| room.id != main && room.fits(ENTRANCE_EXIT_MIN_SIZE))
            .map(|room| room.id)
            .take(TOP_CANDIDATES)
            .collect();
        random::choose(rng, &candidates).copied().unwrap_or(main)
    }

    fn pick_exit(&self, rooms: &[Room], entrance: RoomId, rng: &mut dyn RandomSource) -> Option<RoomId> {
        if let Some(id) = self.exit_override {
            if (id as usize) < rooms.len() && id != entrance {
                return Some(id);
            }
            warn!("Exit override {} ignored", id);
        }

        let room_count = rooms.len() as u32;
        let candidates: Vec<&Room> = rooms
            .iter()
            .filter(|room| {
                room.id != entrance
                    && room.fits(ENTRANCE_EXIT_MIN_SIZE)
                    && room.distance_from_start.is_some_and(|d| d * 3 >= room_count)
            })
            .collect();
        if let Some(id) = pick_among_largest(&candidates, rng) {
            return Some(id);
        }

        // Farthest reachable room; ties go to the lowest id
        rooms
            .iter()
            .filter(|room| room.id != entrance)
            .filter_map(|room| room.distance_from_start.map(|d| (d, room.id)))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|(_, id)| id)
    }
}

/// Largest room by floor area; ties go to the lowest id.
pub fn main_room(rooms: &[Room]) -> Option<RoomId> {
    rooms
        .iter()
        .max_by(|a, b| a.area().cmp(&b.area()).then(b.id.cmp(&a.id)))
        .map(|room| room.id)
}

/// Sorts by descending area (stable on id) and picks uniformly among the
/// first [`TOP_CANDIDATES`].
fn pick_among_largest(candidates: &[&Room], rng: &mut dyn RandomSource) -> Option<RoomId> {
    let mut sorted: Vec<&Room> = candidates.to_vec();
    sorted.sort_by(|a, b| b.area().cmp(&a.area()).then(a.id.cmp(&b.id)));
    sorted.truncate(TOP_CANDIDATES);
    random::choose(rng, &sorted).map(|room| room.id)
}

fn pick_boss(rooms: &[Room]) -> Option<RoomId> {
    let room_count = rooms.len() as u32;
    let mut candidates: Vec<&Room> = rooms
        .iter()
        .filter(|room| {
            room.room_type == RoomType::Normal
                && room.fits(BOSS_MIN_SIZE)
                && room.distance_from_start.is_some_and(|d| d * 2 >= room_count)
        })
        .collect();
    candidates.sort_by(|a, b| b.area().cmp(&a.area()).then(a.id.cmp(&b.id)));
    candidates.first().map(|room| room.id)
}

/// Gives `role` to `count` random normal rooms accepted by `eligible`.
fn assign_role<F>(
    rooms: &mut [Room],
    role: RoomType,
    count: usize,
    rng: &mut dyn RandomSource,
    eligible: F,
) where
    F: Fn(&Room) -> bool,
{
    if count == 0 {
        return;
    }
    let pool: Vec<RoomId> = rooms
        .iter()
        .filter(|room| room.room_type == RoomType::Normal && eligible(room))
        .map(|room| room.id)
        .collect();
    for id in random::sample(rng, &pool, count) {
        rooms[id as usize].room_type = role;
    }
}

/// Breadth-first hop counts from `start` over room connections.
///
/// Unreachable rooms keep `distance_from_start = None`.
pub fn compute_distances(rooms: &mut [Room], start: RoomId) {
    for room in rooms.iter_mut() {
        room.distance_from_start = None;
    }
    if start as usize >= rooms.len() {
        return;
    }

    rooms[start as usize].distance_from_start = Some(0);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let distance = rooms[current as usize].distance_from_start.unwrap_or(0);
        let neighbors = rooms[current as usize].connections.clone();
        for next in neighbors {
            let Some(room) = rooms.get_mut(next as usize) else {
                continue;
            };
            if room.distance_from_start.is_none() {
                room.distance_from_start = Some(distance + 1);
                queue.push_back(next);
            }
        }
    }
}

/// Shortest room path from `entrance` to `exit`, both inclusive.
pub fn critical_path(rooms: &[Room], entrance: RoomId, exit: RoomId) -> Option<Vec<RoomId>> {
    bfs(
        &entrance,
        |&id| {
            rooms
                .get(id as usize)
                .map(|room| room.connections.clone())
                .unwrap_or_default()
        },
        |&id| id == exit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rect, RoomShape, SeededRandom};

    /// A chain of rooms 0 - 1 - 2 - ... with the given sizes.
    fn chain(sizes: &[i32]) -> Vec<Room> {
        let mut rooms: Vec<Room> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                Room::new(i as u32, Rect::new(i as i32 * 30, 0, size, size), RoomShape::Rectangle)
            })
            .collect();
        for i in 1..rooms.len() {
            rooms[i - 1].add_connection(i as u32);
            rooms[i].add_connection(i as u32 - 1);
        }
        rooms
    }

    fn analyzer() -> TopologyAnalyzer {
        TopologyAnalyzer {
            entrance_override: None,
            exit_override: None,
            include_boss_room: true,
            treasure_chance: 0.0,
            shop_chance: 0.0,
            secret_chance: 0.0,
            challenge_chance: 0.0,
        }
    }

    #[test]
    fn test_distances_on_chain() {
        let mut rooms = chain(&[8, 8, 8, 8]);
        compute_distances(&mut rooms, 1);
        let distances: Vec<Option<u32>> = rooms.iter().map(|r| r.distance_from_start).collect();
        assert_eq!(distances, vec![Some(1), Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_unreachable_rooms_have_no_distance() {
        let mut rooms = chain(&[8, 8]);
        rooms.push(Room::new(2, Rect::new(100, 100, 8, 8), RoomShape::Rectangle));
        compute_distances(&mut rooms, 0);
        assert_eq!(rooms[2].distance_from_start, None);
        assert_eq!(critical_path(&rooms, 0, 2), None);
    }

    #[test]
    fn test_critical_path_on_branching_graph() {
        let mut rooms = chain(&[8, 8, 8, 8]);
        // Shortcut 0 - 3 and a branch 1 - 4
        rooms.push(Room::new(4, Rect::new(0, 100, 8, 8), RoomShape::Rectangle));
        rooms[0].add_connection(3);
        rooms[3].add_connection(0);
        rooms[1].add_connection(4);
        rooms[4].add_connection(1);

        assert_eq!(critical_path(&rooms, 0, 3), Some(vec![0, 3]));
        assert_eq!(critical_path(&rooms, 4, 2), Some(vec![4, 1, 2]));
    }

    #[test]
    fn test_main_room_is_largest() {
        let rooms = chain(&[8, 12, 9, 12]);
        assert_eq!(main_room(&rooms), Some(1));
        assert_eq!(main_room(&[]), None);
    }

    #[test]
    fn test_analyze_chain_roles() {
        let mut rooms = chain(&[8, 12, 9, 12, 10, 11]);
        let mut rng = SeededRandom::new(5);
        let topology = analyzer().analyze(&mut rooms, &mut rng);

        let entrance = topology.entrance.unwrap();
        let exit = topology.exit.unwrap();
        assert_ne!(entrance, exit);
        assert!(rooms[1].is_main_room);
        assert_ne!(entrance, 1, "main room is not an entrance candidate");
        assert_eq!(rooms[entrance as usize].room_type, RoomType::Entrance);
        assert_eq!(rooms[exit as usize].room_type, RoomType::Exit);

        assert_eq!(topology.critical_path.first(), Some(&entrance));
        assert_eq!(topology.critical_path.last(), Some(&exit));
        for &id in &topology.critical_path {
            assert!(rooms[id as usize].has_tag(RoomTag::CriticalPath));
        }
        assert!(rooms[0].has_tag(RoomTag::DeadEnd));
        assert!(rooms[5].has_tag(RoomTag::DeadEnd));

        if let Some(boss) = topology.boss {
            assert_ne!(boss, entrance);
            assert_ne!(boss, exit);
            assert!(rooms[boss as usize].fits(10));
        }
    }

    #[test]
    fn test_overrides_are_honoured() {
        let mut rooms = chain(&[8, 8, 8, 8, 8]);
        let analyzer = TopologyAnalyzer {
            entrance_override: Some(4),
            exit_override: Some(0),
            ..analyzer()
        };
        let topology = analyzer.analyze(&mut rooms, &mut SeededRandom::new(1));
        assert_eq!(topology.entrance, Some(4));
        assert_eq!(topology.exit, Some(0));
        assert_eq!(topology.critical_path, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_out_of_range_override_falls_back() {
        let mut rooms = chain(&[8, 8, 8]);
        let analyzer = TopologyAnalyzer {
            entrance_override: Some(10),
            ..analyzer()
        };
        let topology = analyzer.analyze(&mut rooms, &mut SeededRandom::new(1));
        assert!(topology.entrance.is_some_and(|id| id < 3));
    }

    #[test]
    fn test_small_rooms_fall_back_to_main_and_farthest() {
        let mut rooms = chain(&[5, 6, 5, 5]);
        let topology = analyzer().analyze(&mut rooms, &mut SeededRandom::new(2));
        // No room fits 8x8: entrance is the main room, exit the farthest one
        assert_eq!(topology.entrance, Some(1));
        assert_eq!(topology.exit, Some(3));
        assert_eq!(topology.boss, None);
    }

    #[test]
    fn test_single_room_has_no_exit() {
        let mut rooms = chain(&[9]);
        let topology = analyzer().analyze(&mut rooms, &mut SeededRandom::new(2));
        assert_eq!(topology.entrance, Some(0));
        assert_eq!(topology.exit, None);
        assert!(topology.critical_path.is_empty());
    }

    #[test]
    fn test_special_roles_are_exclusive() {
        let sizes: Vec<i32> = (0..12).map(|i| 8 + (i % 4)).collect();
        let mut rooms = chain(&sizes);
        let analyzer = TopologyAnalyzer {
            treasure_chance: 0.2,
            shop_chance: 0.2,
            secret_chance: 0.2,
            challenge_chance: 0.2,
            ..analyzer()
        };

        for seed in 0..20 {
            let topology = analyzer.analyze(&mut rooms, &mut SeededRandom::new(seed));
            let count = |role: RoomType| rooms.iter().filter(|r| r.room_type == role).count();

            assert_eq!(count(RoomType::Entrance), 1);
            assert_eq!(count(RoomType::Exit), 1);
            assert!(count(RoomType::Boss) <= 1);
            assert!(count(RoomType::Treasure) <= 2);
            for room in &rooms {
                if room.room_type == RoomType::Treasure {
                    assert!(!room.has_tag(RoomTag::CriticalPath));
                }
                if room.room_type == RoomType::Secret {
                    assert!(room.distance_from_start.unwrap() >= 2);
                }
            }
            assert!(topology.critical_path.len() >= 2);
        }
    }
}
