// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `$XDG_CONFIG_HOME/qrscan/config.json`. Missing fields
//! fall back to their defaults, so older files keep loading.

use crate::constants::{APP_NAME, CaptureQuality, detection, timing};
use crate::errors::{AppError, AppResult};
use crate::model::Coordinate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the configuration file inside the config directory
const CONFIG_FILE_NAME: &str = "config.json";

/// Name of the scan history database file
const DATABASE_FILE_NAME: &str = "scans.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite scan history
    pub database_path: PathBuf,
    /// Directory under which export folders are created
    pub export_dir: PathBuf,
    /// Minimum interval between accepted detections (milliseconds)
    pub scan_cooldown_ms: u64,
    /// How long the saved confirmation stays visible (milliseconds)
    pub confirmation_ms: u64,
    /// Still capture timeout (milliseconds)
    pub capture_timeout_ms: u64,
    /// Frame interval when replaying image files (milliseconds)
    pub frame_interval_ms: u64,
    /// JPEG quality of stored still frames
    pub capture_quality: CaptureQuality,
    /// Frames are downscaled to this size before QR detection
    pub max_detection_dimension: u32,
    /// Position reported for every scan when no positioning service exists
    pub fixed_location: Option<Coordinate>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_dir().join(DATABASE_FILE_NAME),
            export_dir: default_export_dir(),
            scan_cooldown_ms: timing::SCAN_COOLDOWN.as_millis() as u64,
            confirmation_ms: timing::CONFIRMATION_DISPLAY.as_millis() as u64,
            capture_timeout_ms: timing::CAPTURE_TIMEOUT.as_millis() as u64,
            frame_interval_ms: timing::FRAME_INTERVAL.as_millis() as u64,
            capture_quality: CaptureQuality::default(),
            max_detection_dimension: detection::MAX_DIMENSION,
            fixed_location: None,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, or defaults if there is no file
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("No config directory on this platform".into()))?;
        self.save_to(&path)
    }

    /// Write as pretty JSON, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Reject values the coordinator cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.capture_timeout_ms == 0 {
            return Err(AppError::Config(
                "capture_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(AppError::Config(
                "frame_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_detection_dimension < 64 {
            return Err(AppError::Config(
                "max_detection_dimension must be at least 64".into(),
            ));
        }
        if let Some(location) = self.fixed_location {
            Coordinate::new(location.latitude, location.longitude)
                .map_err(|e| AppError::Config(format!("fixed_location: {}", e)))?;
        }
        Ok(())
    }

    pub fn scan_cooldown(&self) -> Duration {
        Duration::from_millis(self.scan_cooldown_ms)
    }

    pub fn confirmation_duration(&self) -> Duration {
        Duration::from_millis(self.confirmation_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Directory holding the scan database
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_NAME)
}

/// Directory export folders are written to
fn default_export_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
}
