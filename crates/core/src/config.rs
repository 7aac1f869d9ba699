//! Engine configuration
//!
//! Canvas ceilings, raster engine retry delay, the label font used by export and the
//! note store location. Built programmatically, from `SCOREMARK_*` environment
//! variables, or from a small `key = value` file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::canvas::CanvasLimits;

/// Default delay before the single retry of a not-ready raster engine
pub const DEFAULT_ENGINE_RETRY_DELAY: Duration = Duration::from_millis(250);

const ENV_MAX_DIMENSION: &str = "SCOREMARK_MAX_CANVAS_DIMENSION";
const ENV_MAX_AREA: &str = "SCOREMARK_MAX_CANVAS_AREA";
const ENV_RETRY_MS: &str = "SCOREMARK_ENGINE_RETRY_MS";
const ENV_LABEL_FONT: &str = "SCOREMARK_LABEL_FONT";
const ENV_STORE_DIR: &str = "SCOREMARK_STORE_DIR";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key `{key}`: {value}")]
    InvalidValue { key: String, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue { key: key.to_string(), value: value.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Hardware ceilings for page canvases
    pub canvas_limits: CanvasLimits,
    /// Wait before retrying a raster engine that reported not-ready
    pub engine_retry_delay: Duration,
    /// TrueType font embedded for export labels; labels are skipped without one
    pub label_font: Option<PathBuf>,
    /// Directory of the JSON note store; platform data dir when unset
    pub store_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas_limits: CanvasLimits::default(),
            engine_retry_delay: DEFAULT_ENGINE_RETRY_DELAY,
            label_font: None,
            store_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn with_canvas_limits(mut self, limits: CanvasLimits) -> Self {
        self.canvas_limits = limits;
        self
    }

    pub fn with_engine_retry_delay(mut self, delay: Duration) -> Self {
        self.engine_retry_delay = delay;
        self
    }

    pub fn with_label_font<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.label_font = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_store_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from environment variables
    ///
    /// - `SCOREMARK_MAX_CANVAS_DIMENSION`: largest canvas side in pixels
    /// - `SCOREMARK_MAX_CANVAS_AREA`: largest canvas area in pixels
    /// - `SCOREMARK_ENGINE_RETRY_MS`: raster engine retry delay
    /// - `SCOREMARK_LABEL_FONT`: TrueType font for export labels
    /// - `SCOREMARK_STORE_DIR`: note store directory
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for key in [ENV_MAX_DIMENSION, ENV_MAX_AREA, ENV_RETRY_MS, ENV_LABEL_FONT, ENV_STORE_DIR] {
            if let Ok(value) = std::env::var(key) {
                config.apply(key, &value)?;
            }
        }

        Ok(config)
    }

    /// Load configuration from a file of `key = value` lines
    ///
    /// ```toml
    /// max_canvas_dimension = 16384
    /// max_canvas_area = 16777216
    /// engine_retry_ms = 250
    /// label_font = "/usr/share/fonts/DejaVuSans.ttf"
    /// store_dir = "/var/lib/scoremark"
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                config.apply(key.trim(), value.trim().trim_matches('"'))?;
            }
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "max_canvas_dimension" | ENV_MAX_DIMENSION => {
                self.canvas_limits.max_dimension = value
                    .parse::<u32>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| ConfigError::invalid(key, value))?;
            }
            "max_canvas_area" | ENV_MAX_AREA => {
                self.canvas_limits.max_area = value
                    .parse::<u64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| ConfigError::invalid(key, value))?;
            }
            "engine_retry_ms" | ENV_RETRY_MS => {
                let ms = value.parse::<u64>().map_err(|_| ConfigError::invalid(key, value))?;
                self.engine_retry_delay = Duration::from_millis(ms);
            }
            "label_font" | ENV_LABEL_FONT => {
                self.label_font = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "store_dir" | ENV_STORE_DIR => {
                self.store_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            _ => {}
        }
        Ok(())
    }
}
