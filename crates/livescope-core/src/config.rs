//! Configuration
//!
//! Settings for the store and the simulated source, loaded from a JSON file.
//! Every field has a default so a partial (or empty) file is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::source::{SimulatedChannel, DEFAULT_SOURCE_BUFFER};

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Nominal samples per second per channel
    pub sample_rate: f64,
    /// A channel silent for longer than this is no longer alive (ms)
    pub alive_timeout_ms: f64,
    /// Events buffered per subscriber before lagging
    pub event_capacity: usize,
    /// Batches buffered between source and ingestion driver
    pub source_buffer: usize,
    /// Seed for the first channel colour; random when absent
    pub color_seed: Option<u64>,
    /// Simulated source settings
    pub simulator: SimulatorConfig,
}

/// Settings for [`SimulatedSource`](crate::source::SimulatedSource)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Channels to generate
    pub channels: Vec<SimulatedChannel>,
    /// Peak amplitude of added noise
    pub noise: f64,
    /// Noise seed; random when absent
    pub seed: Option<u64>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1000.0,
            alive_timeout_ms: 1000.0,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            source_buffer: DEFAULT_SOURCE_BUFFER,
            color_seed: None,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channels: SimulatedChannel::defaults(),
            noise: 0.0,
            seed: None,
        }
    }
}

impl ScopeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: ScopeConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Milliseconds between two samples
    pub fn sample_period(&self) -> f64 {
        1000.0 / self.sample_rate
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: format!("must be a positive number, got {}", self.sample_rate),
            });
        }
        if !(self.alive_timeout_ms.is_finite() && self.alive_timeout_ms > 0.0) {
            return Err(ConfigError::Invalid {
                field: "alive_timeout_ms",
                reason: format!("must be a positive number, got {}", self.alive_timeout_ms),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.source_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "source_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.simulator.noise.is_finite() || self.simulator.noise < 0.0 {
            return Err(ConfigError::Invalid {
                field: "simulator.noise",
                reason: format!("must be a non-negative number, got {}", self.simulator.noise),
            });
        }
        if let Some(channel) = self.simulator.channels.iter().find(|c| c.id.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "simulator.channels",
                reason: format!("channel id must not be empty (offset {})", channel.offset),
            });
        }
        Ok(())
    }
}
