//! # Persistence
//!
//! JSON storage for generated levels and generation configurations.
//!
//! The corridor cell mask is generation scratch state and is not stored; a
//! loaded level carries an empty mask sized to its grid.

use crate::{CellMask, DelveError, DelveResult, GeneratedLevel, GenerationConfig};
use std::fs;
use std::path::Path;

impl GeneratedLevel {
    /// Saves the generation result to pretty-printed JSON.
    pub fn to_json(&self) -> DelveResult<String> {
        serde_json::to_string_pretty(self).map_err(DelveError::from)
    }

    /// Loads a generation result from JSON.
    pub fn from_json(json: &str) -> DelveResult<Self> {
        let mut result: Self = serde_json::from_str(json)?;
        let grid = &result.level.grid;
        result.level.corridor_cells = CellMask::new(grid.width, grid.height);
        Ok(result)
    }

    /// Writes the generation result to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DelveResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a generation result from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> DelveResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

impl GenerationConfig {
    /// Loads a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> DelveResult<Self> {
        serde_json::from_str(json).map_err(DelveError::from)
    }

    /// Reads a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> DelveResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Saves the configuration to pretty-printed JSON.
    pub fn to_json(&self) -> DelveResult<String> {
        serde_json::to_string_pretty(self).map_err(DelveError::from)
    }
}
