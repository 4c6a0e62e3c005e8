//! Measurement configuration
//!
//! Holds the smoothing window, sample rate, detector tuning and probe shape.
//! Stored as JSON; every field has a default so partial files load cleanly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised when a configuration value cannot be used
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Smoothing window must be at least 1, got {0}")]
    InvalidWindow(usize),

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Burst length {burst_ms}ms must be shorter than period {period_ms}ms")]
    BurstTooLong { burst_ms: f32, period_ms: f32 },

    #[error("Probe period {period_ms}ms must be longer than trigger `{name}` ({value}ms)")]
    ProbeTooFast {
        period_ms: f32,
        name: &'static str,
        value: f32,
    },

    #[error("Probe amplitude must be within 0.0..=1.0, got {0}")]
    InvalidAmplitude(f32),

    #[error("Threshold ratio must be greater than 1.0, got {0}")]
    InvalidThreshold(f32),

    #[error("Time constant `{name}` must be positive, got {value}ms")]
    InvalidTimeConstant { name: &'static str, value: f32 },
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_nan() || value <= 0.0 {
        return Err(ConfigError::InvalidTimeConstant { name, value });
    }
    Ok(())
}

fn default_sample_rate() -> u32 {
    crate::DEFAULT_SAMPLE_RATE
}

fn default_sma_window() -> usize {
    crate::DEFAULT_SMA_WINDOW
}

/// Envelope trigger tuning, shared by the playback and recording detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Envelope must exceed the noise floor by this factor to trigger
    pub threshold_ratio: f32,
    /// Envelope attack time constant
    pub attack_ms: f32,
    /// Envelope release time constant
    pub release_ms: f32,
    /// Noise floor adaptation time constant
    pub noise_adapt_ms: f32,
    /// Minimum time a trigger stays asserted after its onset
    pub hold_ms: f32,
    /// Minimum time between two onsets
    pub min_gap_ms: f32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: 10.0,
            attack_ms: 0.5,
            release_ms: 10.0,
            noise_adapt_ms: 100.0,
            hold_ms: 250.0,
            min_gap_ms: 300.0,
        }
    }
}

/// Shape of the burst probe written to the playback stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Time between burst starts
    pub period_ms: f32,
    /// Burst length
    pub burst_ms: f32,
    /// Peak amplitude relative to full scale
    pub amplitude: f32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            period_ms: 500.0,
            burst_ms: 10.0,
            amplitude: 0.5,
        }
    }
}

/// Measurement session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Number of latency reports averaged into `avg_latency`
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,
    /// Playback device name (None = host default)
    #[serde(default)]
    pub output_device: Option<String>,
    /// Recording device name (None = host default)
    #[serde(default)]
    pub input_device: Option<String>,
    /// Detector tuning
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Probe signal shape
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            sma_window: default_sma_window(),
            output_device: None,
            input_device: None,
            trigger: TriggerConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Config {
    /// Default config file path: `<config_dir>/audiolatency/config.json`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audiolatency")
            .join("config.json")
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Check that every value is usable by the estimator and generator
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sma_window == 0 {
            return Err(ConfigError::InvalidWindow(self.sma_window));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate);
        }

        let probe = &self.probe;
        if !(0.0..=1.0).contains(&probe.amplitude) {
            return Err(ConfigError::InvalidAmplitude(probe.amplitude));
        }
        for (name, value) in [("period_ms", probe.period_ms), ("burst_ms", probe.burst_ms)] {
            positive(name, value)?;
        }
        if probe.burst_ms >= probe.period_ms {
            return Err(ConfigError::BurstTooLong {
                burst_ms: probe.burst_ms,
                period_ms: probe.period_ms,
            });
        }

        let trigger = &self.trigger;
        if trigger.threshold_ratio.is_nan() || trigger.threshold_ratio <= 1.0 {
            return Err(ConfigError::InvalidThreshold(trigger.threshold_ratio));
        }
        for (name, value) in [
            ("attack_ms", trigger.attack_ms),
            ("release_ms", trigger.release_ms),
            ("noise_adapt_ms", trigger.noise_adapt_ms),
        ] {
            positive(name, value)?;
        }
        for (name, value) in [
            ("hold_ms", trigger.hold_ms),
            ("min_gap_ms", trigger.min_gap_ms),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::InvalidTimeConstant { name, value });
            }
            // A burst arriving inside the hold or debounce of the previous
            // one produces no onset
            if probe.period_ms <= value {
                return Err(ConfigError::ProbeTooFast {
                    period_ms: probe.period_ms,
                    name,
                    value,
                });
            }
        }

        Ok(())
    }
}
