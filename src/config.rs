//! # Configuration
//!
//! Everything is optional; a missing file section falls back to its defaults.
//!
//! ```toml
//! [arm]
//! port = "/dev/staubli-data"
//! baud = 19200
//! simulate = false
//! resync_on_start = true
//!
//! [origin]
//! x = 500.0
//! y = 0.0
//! z = -100.0
//!
//! [interpreter]
//! arc_sweep = "directional"
//! arc_segment_length = 1.0
//! axis_startup = "reset"
//!
//! [simulator]
//! limit = 200.0
//!
//! [server]
//! addr = "0.0.0.0:5000"
//! feed_addr = "0.0.0.0:5001"
//! log_capacity = 200
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arm::Point;
use crate::interpreter::InterpreterConfig;
use crate::motion::arc::{ArcSettings, ArcSweep};
use crate::run::{AxisStartup, RunSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub arm: ArmConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub interpreter: InterpreterSection,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Serial link to the arm controller's data line.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_true")]
    pub resync_on_start: bool,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            simulate: false,
            resync_on_start: true,
        }
    }
}

/// Translation from program coordinates into the arm's frame.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct OriginConfig {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl OriginConfig {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpreterSection {
    #[serde(default)]
    pub arc_sweep: ArcSweep,
    #[serde(default = "default_segment_length")]
    pub arc_segment_length: f64,
    #[serde(default)]
    pub axis_startup: AxisStartup,
}

impl Default for InterpreterSection {
    fn default() -> Self {
        Self {
            arc_sweep: ArcSweep::default(),
            arc_segment_length: default_segment_length(),
            axis_startup: AxisStartup::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_limit")]
    pub limit: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self { limit: default_limit() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default)]
    pub feed_addr: Option<String>,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            feed_addr: None,
            log_capacity: default_log_capacity(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arm.baud == 0 {
            return Err(ConfigError::Invalid("arm.baud must be > 0".to_string()));
        }
        if !(self.interpreter.arc_segment_length > 0.0) {
            return Err(ConfigError::Invalid("interpreter.arc_segment_length must be > 0".to_string()));
        }
        if !(self.simulator.limit > 0.0) {
            return Err(ConfigError::Invalid("simulator.limit must be > 0".to_string()));
        }
        if self.server.log_capacity == 0 {
            return Err(ConfigError::Invalid("server.log_capacity must be > 0".to_string()));
        }
        let o = self.origin;
        if !(o.x.is_finite() && o.y.is_finite() && o.z.is_finite()) {
            return Err(ConfigError::Invalid("origin must be finite".to_string()));
        }
        Ok(())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            interpreter: InterpreterConfig {
                origin: self.origin.point(),
                arc: ArcSettings {
                    sweep: self.interpreter.arc_sweep,
                    segment_length: self.interpreter.arc_segment_length,
                },
            },
            axis_startup: self.interpreter.axis_startup,
            resync_on_start: self.arm.resync_on_start,
        }
    }
}

// Default value functions
fn default_port() -> String { "/dev/staubli-data".to_string() }
fn default_baud() -> u32 { 19200 }
fn default_true() -> bool { true }
fn default_segment_length() -> f64 { 1.0 }
fn default_limit() -> f64 { crate::arm::simulator::DEFAULT_LIMIT }
fn default_addr() -> String { "0.0.0.0:5000".to_string() }
fn default_log_capacity() -> usize { crate::weblog::DEFAULT_CAPACITY }

/// Parses an `X,Y,Z` origin given on the command line.
pub fn parse_origin(s: &str) -> Result<Point, String> {
    let fields: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, z] = fields.as_slice() else {
        return Err(format!("expected X,Y,Z, got '{}'", s));
    };
    let coord = |v: &str| {
        v.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate '{}'", v))
    };
    Ok(Point::new(coord(x)?, coord(y)?, coord(z)?))
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}
