//! Configuration for the navigation core.
//!
//! All sections have sensible defaults; a TOML file only needs to name the
//! values it changes:
//!
//! ```toml
//! [sensors]
//! enabled = true
//! mode = "raw"
//! azimuth_alpha = 0.1
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{AZIMUTH_ALPHA, LOW_PASS_ALPHA};
use crate::error::{NavError, Result};

/// Which orientation sensor(s) to subscribe to
///
/// # Parsing formats
/// - `auto` - dedicated orientation sensor when the device has one,
///   accelerometer + magnetometer otherwise
/// - `raw` - always fuse accelerometer + magnetometer
/// - `calculated` - the platform's ready-made orientation sensor
///
/// # Example
/// ```
/// use backtrack::config::OrientationSensorMode;
///
/// let mode: OrientationSensorMode = "Raw".parse().unwrap();
/// assert_eq!(mode, OrientationSensorMode::Raw);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OrientationSensorMode {
    /// Prefer the dedicated orientation sensor, fall back to raw sensors
    #[default]
    Auto,
    /// Accelerometer + magnetometer fusion
    Raw,
    /// Platform orientation sensor
    Calculated,
}

impl fmt::Display for OrientationSensorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Raw => "raw",
            Self::Calculated => "calculated",
        };
        f.write_str(name)
    }
}

impl FromStr for OrientationSensorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "raw" => Ok(Self::Raw),
            "calculated" => Ok(Self::Calculated),
            other => Err(format!("invalid orientation sensor mode: {}", other)),
        }
    }
}

/// System-wide configuration
///
/// # Example
/// ```
/// use backtrack::config::NavConfig;
///
/// let mut config = NavConfig::default();
/// config.sensors.enabled = false;
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Orientation sensor configuration
    pub sensors: SensorConfig,
    /// Location handling configuration
    pub navigation: NavigationConfig,
    /// Snapshot output configuration
    pub output: OutputConfig,
}

/// Orientation sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// User switch for sensor based bearing
    pub enabled: bool,
    /// Sensor selection
    pub mode: OrientationSensorMode,
    /// Per-axis low pass alpha for accelerometer and magnetometer vectors (0-1)
    pub low_pass_alpha: f64,
    /// Circular average alpha for the derived azimuth (0-1, lower = smoother)
    pub azimuth_alpha: f64,
}

/// Location handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Drop fixes that repeat the current report or are not newer than it
    pub dedupe_fixes: bool,
}

/// Snapshot output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Maximum snapshot rate in Hz of event time; 0 prints every change
    pub rate_hz: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: OrientationSensorMode::Auto,
            low_pass_alpha: LOW_PASS_ALPHA,
            azimuth_alpha: AZIMUTH_ALPHA,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { dedupe_fixes: true }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { rate_hz: 0.0 }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, alpha) in [
            ("low_pass_alpha", self.low_pass_alpha),
            ("azimuth_alpha", self.azimuth_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(NavError::Config(format!(
                    "sensors.{} = {} is not in range 0.0 .. 1.0",
                    name, alpha
                )));
            }
        }
        Ok(())
    }
}

impl NavConfig {
    /// Parse a TOML document; missing values keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: NavConfig =
            toml::from_str(content).map_err(|e| NavError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.sensors.validate()?;
        if !self.output.rate_hz.is_finite() || self.output.rate_hz < 0.0 {
            return Err(NavError::Config(format!(
                "output.rate_hz = {} must be zero or positive",
                self.output.rate_hz
            )));
        }
        Ok(())
    }
}
