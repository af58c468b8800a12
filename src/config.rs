//! Engine Configuration
//!
//! Rule constants for both modes. Built from defaults, a JSON document, or
//! `TOWER_CLASH_*` environment variables layered over the defaults.
//! Match capacity is fixed at two and is not configurable.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration load failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document is not valid JSON for the config shape.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    /// A rate or multiplier that must be a finite positive number.
    #[error("{field} must be finite and positive, got {value}")]
    NotPositive {
        /// Offending field.
        field: &'static str,
        /// Value found.
        value: f64,
    },
}

/// Simple (turn-based) mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleConfig {
    /// Advisory turn length reported to clients (seconds).
    pub turn_time_secs: u64,
}

impl Default for SimpleConfig {
    fn default() -> Self {
        Self { turn_time_secs: 30 }
    }
}

/// Enhanced (real-time) mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedConfig {
    /// Match length (seconds).
    pub duration_secs: u64,
    /// Mana each player starts with.
    pub mana_start: u32,
    /// Mana cap.
    pub mana_max: u32,
    /// Mana regenerated per second.
    pub mana_regen_per_sec: f64,
    /// Damage multiplier on a critical hit.
    pub crit_multiplier: f64,
    /// Experience for the winner.
    pub exp_win: u32,
    /// Experience for each player on a draw.
    pub exp_draw: u32,
}

impl Default for EnhancedConfig {
    fn default() -> Self {
        Self {
            duration_secs: 180,
            mana_start: 5,
            mana_max: 10,
            mana_regen_per_sec: 1.0,
            crit_multiplier: 1.2,
            exp_win: 30,
            exp_draw: 10,
        }
    }
}

impl EnhancedConfig {
    /// Match length as a `Duration`.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Reject a regen rate or crit multiplier that is not finite and positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("mana_regen_per_sec", self.mana_regen_per_sec),
            ("crit_multiplier", self.crit_multiplier),
        ];
        for (field, value) in checks {
            if !is_positive_finite(value) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simple mode rules.
    pub simple: SimpleConfig,
    /// Enhanced mode rules.
    pub enhanced: EnhancedConfig,
    /// Base seed for match RNGs. `None` draws fresh entropy per match.
    pub rng_seed: Option<u64>,
}

impl EngineConfig {
    /// Parse and validate a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.enhanced.validate()?;
        Ok(config)
    }

    /// Create config from environment variables over the defaults.
    ///
    /// Unparseable values are ignored and the default is kept. Rates must
    /// also be finite and positive.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("TOWER_CLASH_TURN_TIME_SECS") {
            config.simple.turn_time_secs = v;
        }
        if let Some(v) = env_parse("TOWER_CLASH_DURATION_SECS") {
            config.enhanced.duration_secs = v;
        }
        if let Some(v) = env_parse("TOWER_CLASH_MANA_START") {
            config.enhanced.mana_start = v;
        }
        if let Some(v) = env_parse("TOWER_CLASH_MANA_MAX") {
            config.enhanced.mana_max = v;
        }
        if let Some(v) = env_rate("TOWER_CLASH_MANA_REGEN") {
            config.enhanced.mana_regen_per_sec = v;
        }
        if let Some(v) = env_rate("TOWER_CLASH_CRIT_MULTIPLIER") {
            config.enhanced.crit_multiplier = v;
        }
        if let Some(v) = env_parse("TOWER_CLASH_EXP_WIN") {
            config.enhanced.exp_win = v;
        }
        if let Some(v) = env_parse("TOWER_CLASH_EXP_DRAW") {
            config.enhanced.exp_draw = v;
        }
        config.rng_seed = env_parse("TOWER_CLASH_RNG_SEED");

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_rate(key: &str) -> Option<f64> {
    std::env::var(key).ok().as_deref().and_then(parse_rate)
}

fn parse_rate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| is_positive_finite(*v))
}

fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
