//! Configuration for betting

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Betting policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BettingConfig {
    /// Smallest accepted bet
    pub min_bet: i64,

    /// Largest accepted bet
    pub max_bet: i64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            min_bet: 1,
            max_bet: i64::MAX,
        }
    }
}

impl BettingConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
        let config: BettingConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the bet limits are consistent
    pub fn validate(&self) -> Result<()> {
        if self.min_bet > self.max_bet {
            return Err(Error::Config(format!(
                "min_bet ({}) cannot be greater than max_bet ({})",
                self.min_bet, self.max_bet
            )));
        }
        Ok(())
    }
}
