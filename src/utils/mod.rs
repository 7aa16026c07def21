//! # Utilities Module
//!
//! Seeded randomness and grid flood-fill helpers shared by the generation stages.

pub mod flood_fill;
pub mod random;

pub use flood_fill::*;
pub use random::*;
