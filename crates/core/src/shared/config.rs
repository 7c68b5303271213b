use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_EVENT_QUEUE_CAPACITY,
    DEFAULT_IDENTIFICATION_INTERVAL_SECS, DEFAULT_MAX_RELATIVE_SHIFT,
    DEFAULT_MISSING_FRAMES_TOLERANCE, DEFAULT_REMOTE_TIMEOUT_SECS, STORE_FILE_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tuning of the per-frame tracker and its identification worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Largest frame-to-frame shift, relative to the previous box size,
    /// that still continues a track.
    pub max_relative_shift: f64,
    /// Frames a face may go undetected before its track is evicted.
    pub missing_frames_tolerance: u32,
    pub identification_interval_secs: f64,
    pub event_queue_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_relative_shift: DEFAULT_MAX_RELATIVE_SHIFT,
            missing_frames_tolerance: DEFAULT_MISSING_FRAMES_TOLERANCE,
            identification_interval_secs: DEFAULT_IDENTIFICATION_INTERVAL_SECS,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_relative_shift.is_finite() && self.max_relative_shift > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_relative_shift must be a positive number, got {}",
                self.max_relative_shift
            )));
        }
        if !(self.identification_interval_secs.is_finite()
            && self.identification_interval_secs > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "identification_interval_secs must be a positive number, got {}",
                self.identification_interval_secs
            )));
        }
        if let Err(e) = Duration::try_from_secs_f64(self.identification_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "identification_interval_secs {} is out of range: {e}",
                self.identification_interval_secs
            )));
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Falls back to the default interval for values `validate` rejects.
    pub fn identification_interval(&self) -> Duration {
        match Duration::try_from_secs_f64(self.identification_interval_secs) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => Duration::from_secs_f64(DEFAULT_IDENTIFICATION_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityStoreConfig {
    pub distance_threshold: f64,
}

impl Default for IdentityStoreConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

impl IdentityStoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "distance_threshold must be a positive number, got {}",
                self.distance_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REMOTE_TIMEOUT_SECS
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Everything a host application configures, loaded from one JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tracker: TrackerConfig,
    pub store: IdentityStoreConfig,
    pub remote: Option<RemoteConfig>,
    pub store_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn default_store_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join(STORE_FILE_NAME))
    }

    /// Loads the user config, falling back to defaults when it is absent.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tracker.validate()?;
        self.store.validate()
    }

    pub fn resolved_store_path(&self) -> Option<PathBuf> {
        self.store_path.clone().or_else(Self::default_store_path)
    }
}
