//! Configuration system for the simulator.
//!
//! This module provides YAML/JSON configuration file support for the
//! simulation parameters a host would otherwise hard-code.
//!
//! # Configuration File Structure
//!
//! ```yaml
//! simulation:
//!   step_limit: 1000
//!   tick_rate_hz: 4.0
//!   auto_propagate: true
//!   log_level: info
//!   collect_stats: false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::propagator::DEFAULT_STEP_LIMIT;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global simulation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Propagation steps allowed per stimulus before reporting oscillation
    #[serde(default = "default_step_limit")]
    pub step_limit: u32,

    /// Rate of continuous ticking
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: f64,

    /// Drain immediately after every stimulus
    #[serde(default = "default_auto_propagate")]
    pub auto_propagate: bool,

    /// Logging level (off, trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether the simulator measures wall-clock time spent draining
    #[serde(default)]
    pub collect_stats: bool,
}

fn default_step_limit() -> u32 {
    DEFAULT_STEP_LIMIT
}

fn default_tick_rate_hz() -> f64 {
    1.0
}

fn default_auto_propagate() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            step_limit: default_step_limit(),
            tick_rate_hz: default_tick_rate_hz(),
            auto_propagate: default_auto_propagate(),
            log_level: default_log_level(),
            collect_stats: false,
        }
    }
}

impl SimulationParams {
    /// Validates the parameters.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.step_limit == 0 {
            return Err(ConfigError::Validation("step_limit must be at least 1".to_string()));
        }
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "tick_rate_hz must be positive and finite, got {}",
                self.tick_rate_hz
            )));
        }
        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of off, trace, debug, info, warn, error; got {:?}",
                self.log_level
            )));
        }
        Ok(())
    }
}

/// Complete simulator configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global simulation parameters
    #[serde(default)]
    pub simulation: SimulationParams,
}

impl SimConfig {
    /// Creates a configuration with every parameter at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the entire configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.simulation.validate()
    }

    /// Installs the global subscriber at the configured `log_level`.
    ///
    /// `RUST_LOG` still takes precedence when set.
    pub fn init_logging(&self) {
        crate::init_logging(&self.simulation.log_level);
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Saves configuration to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating SimConfig programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the oscillation step limit.
    pub fn step_limit(mut self, limit: u32) -> Self {
        self.config.simulation.step_limit = limit;
        self
    }

    /// Sets the continuous tick rate.
    pub fn tick_rate_hz(mut self, rate: f64) -> Self {
        self.config.simulation.tick_rate_hz = rate;
        self
    }

    /// Chooses whether stimuli drain immediately.
    pub fn auto_propagate(mut self, enable: bool) -> Self {
        self.config.simulation.auto_propagate = enable;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Enables statistics collection.
    pub fn collect_stats(mut self, enable: bool) -> Self {
        self.config.simulation.collect_stats = enable;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
