//! Configuration management for TrinityChain maintenance

use crate::error::ChainError;
use crate::types::{BlockHeight, DEFAULT_MATURITY_DELAY};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_maturity_delay")]
    pub maturity_delay: BlockHeight,
    #[serde(default)]
    pub verify_invariants: VerifyMode,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            maturity_delay: default_maturity_delay(),
            verify_invariants: VerifyMode::default(),
        }
    }
}

/// When to run the whole-ledger invariant sweep after each block. The
/// per-entity checks inside maintenance always run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    Always,
    #[default]
    DebugOnly,
    Never,
}

impl VerifyMode {
    pub fn enabled(self) -> bool {
        match self {
            VerifyMode::Always => true,
            VerifyMode::DebugOnly => cfg!(debug_assertions),
            VerifyMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

fn default_maturity_delay() -> BlockHeight {
    DEFAULT_MATURITY_DELAY
}

fn default_db_path() -> String {
    "./data/consensus.db".to_string()
}

/// Parse a config from TOML text and validate it.
pub fn parse_config(config_str: &str) -> Result<Config, ChainError> {
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(config_str).map_err(|e| ChainError::ConfigError(e.to_string()))?
    };

    // Validate critical values
    if config.consensus.maturity_delay == 0 {
        return Err(ChainError::ConfigError(
            "consensus.maturity_delay must be at least 1".to_string(),
        ));
    }
    if config.database.path.is_empty() {
        return Err(ChainError::ConfigError("database.path must be set".to_string()));
    }

    Ok(config)
}

/// Load the config at `path`, falling back to defaults when the file is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        return parse_config("");
    }
    let config_str = fs::read_to_string(path)?;
    parse_config(&config_str)
}
