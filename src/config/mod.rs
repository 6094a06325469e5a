//! Configuration for the readout tools
//!
//! Loaded from a TOML file; every section and field has a default, so an
//! empty file (or no file at all) is a valid configuration.
//!
//! # Example
//! ```toml
//! [decoder]
//! num_rocs = 16
//!
//! [calibration]
//! file = "levels.dat"
//! format = 3
//!
//! [emulator]
//! seed = 42
//! noise_sigma = 10.0
//! hits_per_roc = 4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::calibration::{Calibration, CalibrationFormat, CalibrationLoader};
use crate::common::constants::{MAX_PIXELS_PER_ROC, MAX_ROCS_PER_MODULE};
use crate::common::{CalibrationArgs, ConfigurationResult};
use crate::data_source_emulator::EmulatorConfig;
use crate::reader::ReadoutConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let config = Self::load(path)?;
            info!(config_file = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            info!(config_file = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply command-line calibration overrides
    pub fn apply_calibration_args(&mut self, args: &CalibrationArgs) -> Result<(), ConfigError> {
        if let Some(file) = &args.calibration_file {
            self.calibration.file = Some(file.clone());
        }
        if let Some(format) = args.format {
            self.calibration.format = CalibrationFormat::try_from(format)
                .map_err(|e| ConfigError::invalid("calibration.format", e.to_string()))?;
        }
        if let Some(num_rocs) = args.num_rocs {
            self.decoder.num_rocs = num_rocs;
        }
        self.validate()
    }

    /// Load the configured calibration file
    ///
    /// Without a file the result is an uncalibrated table, which locates
    /// nothing.
    pub fn load_calibration(&self) -> ConfigurationResult<Calibration> {
        match &self.calibration.file {
            Some(file) => {
                CalibrationLoader::load_file(file, self.calibration.format, self.decoder.num_rocs)
            }
            None => {
                warn!("No calibration file configured, using an uncalibrated table");
                Ok(Calibration::new(self.decoder.num_rocs))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decoder.num_rocs > MAX_ROCS_PER_MODULE {
            return Err(ConfigError::invalid(
                "decoder.num_rocs",
                format!("{} exceeds {}", self.decoder.num_rocs, MAX_ROCS_PER_MODULE),
            ));
        }
        if self.decoder.pixel_capacity == 0 {
            return Err(ConfigError::invalid("decoder.pixel_capacity", "must be positive"));
        }
        if self.emulator.num_rocs > MAX_ROCS_PER_MODULE {
            return Err(ConfigError::invalid(
                "emulator.num_rocs",
                format!("{} exceeds {}", self.emulator.num_rocs, MAX_ROCS_PER_MODULE),
            ));
        }
        if self.emulator.noise_sigma < 0.0 {
            return Err(ConfigError::invalid("emulator.noise_sigma", "must not be negative"));
        }
        Ok(())
    }
}

// =============================================================================
// Decoder Configuration
// =============================================================================

/// Decoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// ROCs read out behind the TBM
    #[serde(default = "default_num_rocs")]
    pub num_rocs: usize,

    /// Pixel hits per ROC before a decode is aborted
    #[serde(default = "default_pixel_capacity")]
    pub pixel_capacity: usize,

    /// Print a raw dump of every buffer
    #[serde(default)]
    pub dump: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            num_rocs: default_num_rocs(),
            pixel_capacity: default_pixel_capacity(),
            dump: false,
        }
    }
}

impl DecoderConfig {
    pub fn readout_config(&self) -> ReadoutConfig {
        ReadoutConfig {
            pixel_capacity: self.pixel_capacity,
            dump_enabled: self.dump,
        }
    }
}

fn default_num_rocs() -> usize {
    MAX_ROCS_PER_MODULE
}

fn default_pixel_capacity() -> usize {
    MAX_PIXELS_PER_ROC
}

// =============================================================================
// Calibration Configuration
// =============================================================================

/// Where the level calibration comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Calibration file; none means an uncalibrated table
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// File format number (1, 2 or 3)
    #[serde(default = "default_calibration_format")]
    pub format: CalibrationFormat,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            file: None,
            format: default_calibration_format(),
        }
    }
}

fn default_calibration_format() -> CalibrationFormat {
    CalibrationFormat::Dump
}
