//! Configuration consumed by the simulator and the framer.
//!
//! A configuration file is TOML:
//!
//! ```toml
//! [tools.simulator]
//! min_message_delay_microseconds = 1
//! max_message_delay_microseconds = 100000
//! seed = 195911405
//!
//! [network]
//! buffer_block_size = 4096
//! max_body_length = 16777216
//! ```
//!
//! Every key is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error as ThisError;

/// Settings for the virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Lower bound of the injected delivery delay
    pub min_message_delay_microseconds: u32,
    /// Upper bound of the injected delivery delay
    pub max_message_delay_microseconds: u32,
    /// Seeds every node's random number generator
    pub seed: u64,
}

impl SimulatorConfig {
    /// The smallest delay a remote delivery can be given.
    pub fn min_delay(&self) -> Duration {
        Duration::from_micros(self.min_message_delay_microseconds.into())
    }

    /// The largest delay a remote delivery can be given.
    pub fn max_delay(&self) -> Duration {
        Duration::from_micros(self.max_message_delay_microseconds.into())
    }

    /// Sets both delay bounds.
    pub fn delays(mut self, min_microseconds: u32, max_microseconds: u32) -> Self {
        self.min_message_delay_microseconds = min_microseconds;
        self.max_message_delay_microseconds = max_microseconds;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Checks that the delay range is not empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_message_delay_microseconds > self.max_message_delay_microseconds {
            Err(ConfigError::DelayRange {
                min: self.min_message_delay_microseconds,
                max: self.max_message_delay_microseconds,
            })?
        }
        Ok(())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_message_delay_microseconds: 1,
            max_message_delay_microseconds: 100_000,
            seed: 0xBAD5EED,
        }
    }
}

/// Settings for the message framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// The smallest read buffer the framer allocates
    pub buffer_block_size: usize,
    /// The largest body a header may declare
    pub max_body_length: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            buffer_block_size: 4096,
            max_body_length: 16 * 1024 * 1024,
        }
    }
}

/// The `[tools]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub simulator: SimulatorConfig,
}

/// A complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub network: ParserConfig,
}

impl Config {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tools.simulator.validate()?;
        if self.network.buffer_block_size == 0 {
            Err(ConfigError::BlockSize)?
        }
        Ok(())
    }
}

impl From<SimulatorConfig> for Config {
    fn from(simulator: SimulatorConfig) -> Self {
        Self {
            tools: ToolsConfig { simulator },
            network: Default::default(),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Failed to read the configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("The minimum message delay {min}us exceeds the maximum {max}us")]
    DelayRange { min: u32, max: u32 },
    #[error("The buffer block size must be positive")]
    BlockSize,
}
