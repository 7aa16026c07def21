//! # Space Partitioning
//!
//! Binary space partitioning of the level bounds into leaf regions, one room
//! candidate per leaf.

use crate::{GenerationConfig, RandomSource, Rect, Room};
use log::debug;

/// Axis a BSP node is cut along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// Divides the width, producing left and right children
    Horizontal,
    /// Divides the height, producing top and bottom children
    Vertical,
}

/// Width/height difference below which the split axis is picked at random.
const AXIS_TOLERANCE: i32 = 5;

/// Depth up to which nodes always attempt to split.
const GUARANTEED_SPLIT_DEPTH: u32 = 2;

/// A node of the partition tree. Only leaves (no children) own a room.
#[derive(Debug, Clone)]
pub struct BspNode {
    /// Region covered by this node
    pub bounds: Rect,
    /// Distance from the root
    pub depth: u32,
    pub left: Option<Box<BspNode>>,
    pub right: Option<Box<BspNode>>,
    /// Room placed in this leaf, if any
    pub room: Option<Room>,
}

impl BspNode {
    /// Creates a childless node.
    pub fn new(bounds: Rect, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            left: None,
            right: None,
            room: None,
        }
    }

    /// Returns true if the node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Leaf bounds, left subtree before right subtree.
    pub fn leaves(&self) -> Vec<Rect> {
        let mut leaves = Vec::new();
        self.visit_leaves(&mut |leaf| leaves.push(leaf.bounds));
        leaves
    }

    fn visit_leaves(&self, visit: &mut dyn FnMut(&BspNode)) {
        if self.is_leaf() {
            visit(self);
            return;
        }
        for child in [&self.left, &self.right].into_iter().flatten() {
            child.visit_leaves(visit);
        }
    }

    /// Mutable access to every leaf, in the same order as [`BspNode::leaves`].
    pub fn leaves_mut(&mut self) -> Vec<&mut BspNode> {
        if self.is_leaf() {
            return vec![self];
        }
        let mut leaves = Vec::new();
        if let Some(left) = self.left.as_deref_mut() {
            leaves.extend(left.leaves_mut());
        }
        if let Some(right) = self.right.as_deref_mut() {
            leaves.extend(right.leaves_mut());
        }
        leaves
    }

    /// Consumes the tree, returning the rooms owned by its leaves in leaf order.
    pub fn into_rooms(self) -> Vec<Room> {
        if self.is_leaf() {
            return self.room.into_iter().collect();
        }
        let mut rooms = Vec::new();
        for child in [self.left, self.right].into_iter().flatten() {
            rooms.extend(child.into_rooms());
        }
        rooms
    }
}

/// Recursive BSP subdivision honouring a minimum leaf size and a depth limit.
#[derive(Debug, Clone)]
pub struct SpacePartitioner {
    /// Smallest side a child may have after a cut
    pub min_leaf_size: i32,
    /// Depth at which splitting stops
    pub max_depth: u32,
    /// Probability of splitting a node deeper than the guaranteed depth
    pub split_chance: f64,
}

impl SpacePartitioner {
    /// Creates a partitioner sized for `target_room_count` leaves.
    ///
    /// The depth limit is `ceil(log2(target_room_count))`.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::SpacePartitioner;
    ///
    /// let partitioner = SpacePartitioner::new(10, 6);
    /// assert_eq!(partitioner.max_depth, 3);
    /// ```
    pub fn new(min_leaf_size: u32, target_room_count: u32) -> Self {
        Self {
            min_leaf_size: min_leaf_size as i32,
            max_depth: (target_room_count.max(1) as f64).log2().ceil() as u32,
            split_chance: 0.8,
        }
    }

    /// Creates a partitioner from a configuration and a drawn room target.
    pub fn from_config(config: &GenerationConfig, target_room_count: u32) -> Self {
        Self::new(config.min_leaf_size, target_room_count)
    }

    /// Builds a fresh partition tree over `root`.
    pub fn partition(&self, root: Rect, rng: &mut dyn RandomSource) -> BspNode {
        let mut node = BspNode::new(root, 0);
        self.split(&mut node, rng);
        debug!(
            "Partitioned {}x{} into {} leaves (max depth {})",
            root.width,
            root.height,
            node.leaves().len(),
            self.max_depth
        );
        node
    }

    /// Picks the axis to cut: the longer side, or a coin flip when the sides
    /// are within [`AXIS_TOLERANCE`] of each other.
    pub fn choose_axis(&self, bounds: Rect, rng: &mut dyn RandomSource) -> SplitAxis {
        if (bounds.width - bounds.height).abs() < AXIS_TOLERANCE {
            if rng.chance(0.5) {
                SplitAxis::Horizontal
            } else {
                SplitAxis::Vertical
            }
        } else if bounds.width > bounds.height {
            SplitAxis::Horizontal
        } else {
            SplitAxis::Vertical
        }
    }

    fn split(&self, node: &mut BspNode, rng: &mut dyn RandomSource) {
        if node.depth >= self.max_depth {
            return;
        }
        if node.depth >= GUARANTEED_SPLIT_DEPTH && !rng.chance(self.split_chance) {
            return;
        }

        let bounds = node.bounds;
        let axis = self.choose_axis(bounds, rng);
        let length = match axis {
            SplitAxis::Horizontal => bounds.width,
            SplitAxis::Vertical => bounds.height,
        };
        if length < 2 * self.min_leaf_size {
            return;
        }

        let offset = rng.next_int(self.min_leaf_size, length - self.min_leaf_size + 1);
        let (first, second) = match axis {
            SplitAxis::Horizontal => (
                Rect::new(bounds.x, bounds.y, offset, bounds.height),
                Rect::new(bounds.x + offset, bounds.y, bounds.width - offset, bounds.height),
            ),
            SplitAxis::Vertical => (
                Rect::new(bounds.x, bounds.y, bounds.width, offset),
                Rect::new(bounds.x, bounds.y + offset, bounds.width, bounds.height - offset),
            ),
        };

        let mut left = BspNode::new(first, node.depth + 1);
        let mut right = BspNode::new(second, node.depth + 1);
        self.split(&mut left, rng);
        self.split(&mut right, rng);

        node.left = Some(Box::new(left));
        node.right = Some(Box::new(right));
    }
}
