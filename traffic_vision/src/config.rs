// THEORY:
// `MonitorConfig` collects every tunable of the monitor in one place. The
// defaults are the monitor's reference behaviour (camera 0, Canny 50/150, a
// 100 ms pause between frames, `q` to stop), so running with no configuration
// file at all is the normal case. A TOML file named by `TRAFFIC_MONITOR_CONFIG`
// can override any subset of fields; missing sections fall back to defaults.

use crate::capture_loop::LoopSettings;
use crate::core_modules::frame_analyzer::EdgeThresholds;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "TRAFFIC_MONITOR_CONFIG";

/// Where frames come from: a capture device index or a video file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum VideoInput {
    Device(i32),
    File(PathBuf),
}

impl Default for VideoInput {
    fn default() -> Self {
        VideoInput::Device(0)
    }
}

impl fmt::Display for VideoInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoInput::Device(index) => write!(f, "camera {index}"),
            VideoInput::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub input: VideoInput,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub canny_low_threshold: f64,
    pub canny_high_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let thresholds = EdgeThresholds::default();
        Self {
            canny_low_threshold: thresholds.low,
            canny_high_threshold: thresholds.high,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Pause after each reported frame, in milliseconds.
    pub frame_delay_ms: u64,
    /// Key that stops the loop when pressed in the display window.
    pub stop_key: char,
    pub window_title: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frame_delay_ms: 100,
            stop_key: 'q',
            window_title: "Traffic Monitoring".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub analysis: AnalysisConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `TRAFFIC_MONITOR_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("canny_low_threshold", self.analysis.canny_low_threshold),
            ("canny_high_threshold", self.analysis.canny_high_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    message: format!("{name} must be a non-negative number, got {value}"),
                });
            }
        }
        if !self.capture.stop_key.is_ascii() || self.capture.stop_key.is_ascii_control() {
            return Err(ConfigError::Invalid {
                message: format!(
                    "stop_key must be a printable ASCII character, got {:?}",
                    self.capture.stop_key
                ),
            });
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid {
                message: format!("unknown log level {:?}", self.logging.level),
            });
        }
        Ok(())
    }

    pub fn edge_thresholds(&self) -> EdgeThresholds {
        EdgeThresholds::new(
            self.analysis.canny_low_threshold,
            self.analysis.canny_high_threshold,
        )
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            thresholds: self.edge_thresholds(),
            frame_delay: Duration::from_millis(self.capture.frame_delay_ms),
        }
    }
}
