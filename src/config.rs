// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::Path;

use serde::Deserialize;

mod error;

pub use error::ConfigError;

use crate::capacity::DEFAULT_CEILING_MB;

const DEFAULT_GRID_CAPACITY: usize = 64;
const DEFAULT_PAGE_SIZE: usize = 16;

/// A YAML representation of the board configuration.
#[derive(Deserialize, Clone)]
pub struct Board {
    /// Where pad assignments and bindings are persisted. A `mock` prefix
    /// keeps state in memory.
    pub state_dir: String,

    /// The audio device to play clips on.
    #[serde(default = "default_audio_device")]
    pub audio_device: String,

    /// The MIDI input device to watch, if any.
    pub midi_device: Option<String>,

    /// Total number of pads.
    #[serde(default = "default_grid_capacity")]
    pub grid_capacity: usize,

    /// Pads visible at a time.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Soft ceiling for persisted state, in megabytes.
    #[serde(default = "default_ceiling_mb")]
    pub storage_ceiling_mb: f64,

    /// Whether a new trigger stops every sounding clip.
    #[serde(default)]
    pub exclusive: bool,

    /// Whether a fresh grid gets the default MIDI note bindings.
    #[serde(default = "default_true")]
    pub seed_default_bindings: bool,
}

fn default_audio_device() -> String {
    "default".to_string()
}

fn default_grid_capacity() -> usize {
    DEFAULT_GRID_CAPACITY
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_ceiling_mb() -> f64 {
    DEFAULT_CEILING_MB
}

fn default_true() -> bool {
    true
}

impl Board {
    /// Deserializes the board config from the given path.
    pub fn deserialize(path: &Path) -> Result<Board, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let board: Board = serde_yml::from_str(&raw)?;
        board.validate()?;
        Ok(board)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_capacity == 0 {
            return Err(ConfigError::Invalid("grid_capacity must be non-zero".into()));
        }
        if self.page_size == 0 || self.page_size > self.grid_capacity {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and grid_capacity ({})",
                self.grid_capacity
            )));
        }
        if self.storage_ceiling_mb <= 0.0 {
            return Err(ConfigError::Invalid(
                "storage_ceiling_mb must be positive".into(),
            ));
        }
        Ok(())
    }
}
