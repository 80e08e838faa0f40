//! Configuration with validation and defaults.

use crate::games::types::DEFAULT_GRID_SIZE;
use crate::ledger::MICROS_PER_UNIT;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MinegridConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub game: GameConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/minegrid_data".to_string(),
        }
    }
}

/// Mines game parameters.
#[derive(Clone, Debug, Copy, Serialize, Deserialize)]
pub struct GameConfig {
    pub grid_size: u8,
    /// House edge in basis points (100 = 1%).
    pub house_edge_bps: u32,
    pub min_bet_micros: u64,
    pub max_bet_micros: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            house_edge_bps: 100,
            min_bet_micros: MICROS_PER_UNIT / 100, // 0.01
            max_bet_micros: 10_000 * MICROS_PER_UNIT,
        }
    }
}

impl GameConfig {
    pub fn max_mines(&self) -> u8 {
        self.grid_size - 1
    }
}

impl MinegridConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate logical consistency before anything touches the disk or
    /// the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.storage.data_directory.is_empty() {
            return Err(ConfigError::MissingRequired("data_directory".to_string()));
        }
        if self.game.grid_size < 2 {
            return Err(ConfigError::InvalidValue(
                "grid_size must be at least 2".to_string(),
            ));
        }
        if self.game.house_edge_bps >= 10_000 {
            return Err(ConfigError::InvalidValue(
                "house_edge_bps must be below 10000".to_string(),
            ));
        }
        if self.game.min_bet_micros == 0 {
            return Err(ConfigError::InvalidValue(
                "min_bet_micros must be > 0".to_string(),
            ));
        }
        if self.game.min_bet_micros > self.game.max_bet_micros {
            return Err(ConfigError::InvalidValue(
                "min_bet_micros must not exceed max_bet_micros".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue(String),
    MissingRequired(String),
    LoadFailed(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigError::MissingRequired(field) => {
                write!(f, "Missing required configuration: {}", field)
            }
            ConfigError::LoadFailed(msg) => write!(f, "Failed to load configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
