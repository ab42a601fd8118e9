//! Chain configuration, loadable from TOML.
//!
//! ```toml
//! difficulty = 3
//!
//! [mining]
//! threads = 4
//! max_attempts = 10000000
//!
//! [mempool]
//! capacity = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use utxochain_consensus::MinerConfig;
use utxochain_core::DIGEST_HEX_LEN;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Blockchain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Leading zero hex characters every block digest must carry.
    pub difficulty: usize,
    pub mining: MiningConfig,
    pub mempool: MempoolConfig,
}

/// Mining section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Worker threads for the nonce search.
    pub threads: usize,
    /// Attempt budget per block; absent means unbounded.
    pub max_attempts: Option<u64>,
}

/// Mempool section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of pending transactions.
    pub capacity: usize,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            difficulty: 3,
            mining: MiningConfig::default(),
            mempool: MempoolConfig::default(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_attempts: None,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

impl From<MiningConfig> for MinerConfig {
    fn from(config: MiningConfig) -> Self {
        MinerConfig {
            threads: config.threads,
            max_attempts: config.max_attempts,
        }
    }
}

impl BlockchainConfig {
    /// Default configuration at the given difficulty.
    pub fn with_difficulty(difficulty: usize) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > DIGEST_HEX_LEN {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds digest length {}",
                self.difficulty, DIGEST_HEX_LEN
            )));
        }
        if self.mining.threads == 0 {
            return Err(ConfigError::Invalid("mining.threads must be at least 1".into()));
        }
        if self.mining.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("mining.max_attempts must be at least 1".into()));
        }
        if self.mempool.capacity == 0 {
            return Err(ConfigError::Invalid("mempool.capacity must be at least 1".into()));
        }
        Ok(())
    }
}
