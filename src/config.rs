//! Configuration for the hand monitor agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default filter tolerance around the nominal sampling period.
pub const DEFAULT_TOLERANCE_NS: i64 = 5_000_000;

/// Sampling parameters shared by the filters, the window buffer and sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Nominal sampling period per sensor, in milliseconds
    pub sampling_period_ms: i64,
    /// Slots per window
    pub window_size: u32,
    /// Tolerance around the sampling period, in nanoseconds
    #[serde(default = "default_tolerance_ns")]
    pub tolerance_ns: i64,
}

fn default_tolerance_ns() -> i64 {
    DEFAULT_TOLERANCE_NS
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: 20,
            window_size: 128,
            tolerance_ns: DEFAULT_TOLERANCE_NS,
        }
    }
}

impl SamplingConfig {
    pub fn new(sampling_period_ms: i64, window_size: u32) -> Self {
        Self {
            sampling_period_ms,
            window_size,
            tolerance_ns: DEFAULT_TOLERANCE_NS,
        }
    }

    pub fn sampling_period_ns(&self) -> i64 {
        self.sampling_period_ms.saturating_mul(1_000_000)
    }

    /// Nominal wall-clock span of one window, in milliseconds.
    pub fn window_duration_ms(&self) -> i64 {
        self.sampling_period_ms * i64::from(self.window_size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_period_ms <= 0 {
            return Err(ConfigError::Invalid(format!(
                "sampling_period_ms must be positive, got {}",
                self.sampling_period_ms
            )));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be at least 1".into()));
        }
        if self.tolerance_ns < 0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance_ns must not be negative, got {}",
                self.tolerance_ns
            )));
        }
        Ok(())
    }
}

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sampling: SamplingConfig,

    /// Consecutive `Other` windows that close an open hand event
    pub max_consecutive_other: u32,

    /// Close an open event when the pipeline stops instead of discarding it
    #[serde(default)]
    pub flush_on_stop: bool,

    /// Path for storing statistics and state
    pub data_path: PathBuf,

    /// JSON-lines file receiving closed hand events
    pub events_file: PathBuf,

    /// Directory for raw motion captures
    pub recordings_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("handmonitor");

        Self {
            sampling: SamplingConfig::default(),
            max_consecutive_other: crate::core::MAX_CONSECUTIVE_OTHER,
            flush_on_stop: false,
            events_file: data_dir.join("hand_events.jsonl"),
            recordings_path: data_dir.join("recordings"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("handmonitor")
            .join("config.json")
    }

    /// Path of the persisted pipeline statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("stats.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampling.validate()?;
        if self.max_consecutive_other == 0 {
            return Err(ConfigError::Invalid(
                "max_consecutive_other must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::Io(e.to_string()))?;
        std::fs::create_dir_all(&self.recordings_path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
