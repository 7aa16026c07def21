//! # Delve
//!
//! Procedural dungeon layout generation.
//!
//! ## Architecture Overview
//!
//! Delve turns a [`GenerationConfig`] into a level: a cell [`Grid`] plus a
//! room graph with roles, doors and keys. The pipeline runs in fixed stages:
//!
//! - **Partitioning**: binary space partitioning of the level bounds
//! - **Room placement**: rectangles, L-shapes and template stamps per leaf
//! - **Corridors**: Prim's minimum spanning tree over room centers
//! - **Topology**: entrance/exit, critical path and special room roles
//! - **Post-processing**: smoothing, connectivity repair, walls, doors, keys
//! - **Validation**: accept the level or retry with a new attempt
//!
//! Generation is a pure function of the configuration: the same config and
//! seed always produce the same level.
//!
//! ```
//! use delve::{generate, GenerationConfig};
//!
//! let result = generate(&GenerationConfig::for_testing(42)).unwrap();
//! println!("{}", result.level.grid);
//! ```

pub mod generation;
pub mod persistence;
pub mod utils;
pub mod world;

pub use generation::*;
pub use utils::*;
pub use world::*;

/// Core error type for level generation.
#[derive(thiserror::Error, Debug)]
pub enum DelveError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Configuration rejected before generation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Grid access outside the level bounds
    #[error("Position {0:?} is outside the grid")]
    OutOfBounds(Position),

    /// A generated level failed validation
    #[error("Level validation failed: {0}")]
    Validation(#[from] ValidationFailure),
}

/// Result type used throughout the Delve codebase.
pub type DelveResult<T> = Result<T, DelveError>;

/// Version information for the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generation defaults.
pub mod config {
    /// Default level width in cells
    pub const DEFAULT_LEVEL_WIDTH: u32 = 64;

    /// Default level height in cells
    pub const DEFAULT_LEVEL_HEIGHT: u32 = 48;

    /// Default number of generation attempts
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
}
