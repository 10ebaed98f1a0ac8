//! TOML configuration for the receiver, processor and frame pipeline.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Files are only ever read, never written.
//!
//! ```toml
//! [receiver]
//! port = 4242
//! mode = "polling"
//!
//! [sensitivity]
//! yaw = 1.5
//! invert_pitch = true
//!
//! [deadzone]
//! yaw = 0.5
//! pitch = 0.5
//! roll = 0.5
//!
//! [smoothing]
//! factor = 0.3
//!
//! [pipeline]
//! frame_interval_ms = 16
//! stats_interval_secs = 10
//! ```

use crate::pose::{DeadzoneSettings, SensitivitySettings};
use crate::processing::TrackingProcessor;
use crate::protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR_NAME: &str = "headtrack";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors returned while loading or validating a [`TrackingConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    /// Malformed TOML or a field of the wrong type.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed, but a value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("No user config directory available on this platform")]
    NoConfigDir,
}

/// Which receiver drives the frame pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverMode {
    /// Background thread, readers see the latest pose lock-free.
    Threaded,
    /// Drained once per frame on the pipeline task.
    #[default]
    Polling,
}

/// `[receiver]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// UDP port OpenTrack sends to. Defaults to 4242.
    pub port: u16,
    pub mode: ReceiverMode,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mode: ReceiverMode::default(),
        }
    }
}

/// `[smoothing]` section.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// 0 = raw input, 1 = heaviest smoothing.
    pub factor: f32,
}

/// `[pipeline]` section, timing of the frame loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Delay between processed frames. Must be at least 1.
    pub frame_interval_ms: u64,
    /// How often receiver statistics are logged. 0 disables the log line.
    pub stats_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16, // ~60 Hz
            stats_interval_secs: 10,
        }
    }
}

/// Complete configuration, one field per TOML section.
///
/// Build it with [`load`](Self::load), [`load_or_default`](Self::load_or_default)
/// or [`from_toml_str`](Self::from_toml_str); all three validate the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub receiver: ReceiverConfig,
    pub sensitivity: SensitivitySettings,
    pub deadzone: DeadzoneSettings,
    pub smoothing: SmoothingConfig,
    pub pipeline: PipelineConfig,
}

impl TrackingConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: TrackingConfig = toml::from_str(content)?;
        if config.receiver.port == 0 {
            return Err(ConfigError::Invalid(
                "receiver.port must be between 1 and 65535".to_string(),
            ));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// Parse and validation errors are still returned.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                warn!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// `<config dir>/headtrack/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Checks value ranges. Port 0 passes here so tests can bind an
    /// ephemeral port; files are rejected in [`from_toml_str`](Self::from_toml_str).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sensitivity = &self.sensitivity;
        for (axis, value) in [
            ("yaw", sensitivity.yaw),
            ("pitch", sensitivity.pitch),
            ("roll", sensitivity.roll),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "sensitivity.{} must be finite, got {}",
                    axis, value
                )));
            }
        }

        let deadzone = &self.deadzone;
        for (axis, value) in [
            ("yaw", deadzone.yaw),
            ("pitch", deadzone.pitch),
            ("roll", deadzone.roll),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "deadzone.{} must be a finite value >= 0, got {}",
                    axis, value
                )));
            }
        }

        let factor = self.smoothing.factor;
        if !factor.is_finite() || !(0.0..=1.0).contains(&factor) {
            return Err(ConfigError::Invalid(format!(
                "smoothing.factor must be within [0, 1], got {}",
                factor
            )));
        }

        if self.pipeline.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.frame_interval_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Pushes sensitivity, deadzone and smoothing into `processor`.
    pub fn apply_to(&self, processor: &mut TrackingProcessor) {
        processor.set_sensitivity(self.sensitivity.clone());
        processor.set_deadzone(self.deadzone.clone());
        processor.set_smoothing(self.smoothing.factor);
    }
}
