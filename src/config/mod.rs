//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::sync::InterpolationConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interpolation and smoothing tuning
    pub interpolation: InterpolationConfig,
    /// Simulated session settings for the demo binary
    pub demo: DemoConfig,
}

/// Simulated remote session parameters
#[derive(Clone, Debug, PartialEq)]
pub struct DemoConfig {
    /// Number of simulated remote players
    pub entities: usize,
    /// Server update rate
    pub update_hz: u32,
    /// Render rate
    pub frame_hz: u32,
    /// How long the demo runs
    pub duration_secs: u64,
    /// Maximum random delivery delay added per update
    pub jitter_ms: u64,
    /// Seed for the simulation RNG, random when unset
    pub seed: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            entities: 4,
            update_hz: 20,
            frame_hz: 60,
            duration_secs: 5,
            jitter_ms: 15,
            seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = InterpolationConfig::default();
        let demo_defaults = DemoConfig::default();

        let interpolation = InterpolationConfig {
            delay_ms: parse_or(&lookup, "INTERPOLATION_DELAY_MS", defaults.delay_ms)?,
            retention_ms: parse_or(&lookup, "SNAPSHOT_RETENTION_MS", defaults.retention_ms)?,
            capacity: parse_or(&lookup, "SNAPSHOT_CAPACITY", defaults.capacity)?,
            smoothing_rate: parse_or(&lookup, "SMOOTHING_RATE", defaults.smoothing_rate)?,
        };

        if !(interpolation.delay_ms.is_finite() && interpolation.delay_ms >= 0.0) {
            return Err(ConfigError::Invalid("INTERPOLATION_DELAY_MS"));
        }
        if !(interpolation.retention_ms.is_finite() && interpolation.retention_ms > 0.0) {
            return Err(ConfigError::Invalid("SNAPSHOT_RETENTION_MS"));
        }
        if interpolation.capacity == 0 {
            return Err(ConfigError::Invalid("SNAPSHOT_CAPACITY"));
        }
        if !(interpolation.smoothing_rate.is_finite() && interpolation.smoothing_rate > 0.0) {
            return Err(ConfigError::Invalid("SMOOTHING_RATE"));
        }

        let demo = DemoConfig {
            entities: parse_or(&lookup, "DEMO_ENTITIES", demo_defaults.entities)?,
            update_hz: parse_or(&lookup, "DEMO_UPDATE_HZ", demo_defaults.update_hz)?,
            frame_hz: parse_or(&lookup, "DEMO_FRAME_HZ", demo_defaults.frame_hz)?,
            duration_secs: parse_or(&lookup, "DEMO_DURATION_SECS", demo_defaults.duration_secs)?,
            jitter_ms: parse_or(&lookup, "DEMO_JITTER_MS", demo_defaults.jitter_ms)?,
            seed: match lookup("DEMO_SEED") {
                Some(raw) => Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| ConfigError::Invalid("DEMO_SEED"))?,
                ),
                None => None,
            },
        };

        if demo.update_hz == 0 {
            return Err(ConfigError::Invalid("DEMO_UPDATE_HZ"));
        }
        if demo.frame_hz == 0 {
            return Err(ConfigError::Invalid("DEMO_FRAME_HZ"));
        }

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            interpolation,
            demo,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
