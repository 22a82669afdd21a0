//! Monitor configuration.

use crate::heart_rate::{DEFAULT_RATE_INTERVALS, DEFAULT_VENTRICULAR_WINDOW_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Timing and buffering parameters for a [`crate::RhythmStepper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Simulation step (ms)
    pub step_ms: f64,

    /// Lag between simulated time and the rendered sample (ms)
    pub render_delay_ms: f64,

    /// Samples retained per lead
    pub stream_capacity: usize,

    /// Coincidence window for ventricular detection (ms)
    pub ventricular_window_ms: f64,

    /// RR intervals kept by the rate estimator
    pub rate_intervals: usize,

    /// Maximum steps taken in one `advance` call before skipping ahead
    pub max_catch_up_steps: usize,

    /// Wall-clock frame interval of the runtime loop (ms)
    pub frame_interval_ms: u64,

    /// RR assumed before the first measured interval (ms)
    pub default_rr_ms: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            step_ms: 5.0,
            render_delay_ms: 120.0,
            stream_capacity: 2000,
            ventricular_window_ms: DEFAULT_VENTRICULAR_WINDOW_MS,
            rate_intervals: DEFAULT_RATE_INTERVALS,
            max_catch_up_steps: 2000,
            frame_interval_ms: 16,
            default_rr_ms: 1000.0,
        }
    }
}

impl MonitorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.step_ms > 0.0) {
            return Err(ConfigError::Invalid(format!("step_ms must be positive, got {}", self.step_ms)));
        }
        if self.render_delay_ms < 0.0 {
            return Err(ConfigError::Invalid("render_delay_ms must not be negative".to_string()));
        }
        if self.stream_capacity == 0 {
            return Err(ConfigError::Invalid("stream_capacity must be at least 1".to_string()));
        }
        if self.rate_intervals == 0 {
            return Err(ConfigError::Invalid("rate_intervals must be at least 1".to_string()));
        }
        if self.max_catch_up_steps == 0 {
            return Err(ConfigError::Invalid("max_catch_up_steps must be at least 1".to_string()));
        }
        if !(self.default_rr_ms > 0.0) {
            return Err(ConfigError::Invalid("default_rr_ms must be positive".to_string()));
        }
        Ok(())
    }
}
