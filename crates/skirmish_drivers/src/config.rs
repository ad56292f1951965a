//! Driver configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ron::error::SpannedError),
}

/// Pacing and exit parameters of the authoritative tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Target ticks per second of the authoritative loop.
    pub ticks_per_second: u32,
    /// Total simulated duration after which the tick loop ends, in
    /// milliseconds of game time.
    pub max_game_duration_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 20,
            max_game_duration_ms: 5 * 60 * 1000,
        }
    }
}

impl DriverConfig {
    /// Load a configuration from a RON file.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&contents)?;
        Ok(config)
    }

    /// Load from a RON string.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(ron)?)
    }

    /// Wall-clock budget of one tick.
    #[must_use]
    pub fn tick_budget(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.ticks_per_second.max(1)))
    }

    /// Number of ticks after which the game-duration cap is reached.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        let tick_ms = 1000.0 / f64::from(self.ticks_per_second.max(1));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = (self.max_game_duration_ms as f64 / tick_ms).ceil() as u64;
        ticks.max(1)
    }
}
