//! Engine policy configuration.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    AFFIRMATION_CAP, CHAT_DAILY_LIMIT, COMPLETION_TIMEOUT_MS, CRYSTAL_COLLECTION_CAP,
    DAILY_CRYSTAL_LIMIT, MOON_REFRESH_SECS, SECRET_HIT_PROBABILITY, SPREAD_FREE_LIMIT, WISH_CAP,
};
use crate::crystal::GrantPolicy;

fn widen(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Errors raised when configuration values are out of bounds.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    ProbabilityRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("config is not valid JSON: {0}")]
    Parse(String),
}

/// Tunable limits and odds. Every field falls back to its default when
/// missing from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_secret_probability")]
    pub secret_probability: f64,
    #[serde(default = "EngineConfig::default_daily_crystal_limit")]
    pub daily_crystal_limit: u32,
    #[serde(default = "EngineConfig::default_spread_free_limit")]
    pub spread_free_limit: u32,
    #[serde(default = "EngineConfig::default_chat_daily_limit")]
    pub chat_daily_limit: u32,
    #[serde(default = "EngineConfig::default_crystal_cap")]
    pub crystal_collection_cap: usize,
    #[serde(default = "EngineConfig::default_affirmation_cap")]
    pub affirmation_cap: usize,
    #[serde(default = "EngineConfig::default_wish_cap")]
    pub wish_cap: usize,
    #[serde(default = "EngineConfig::default_completion_timeout_ms")]
    pub completion_timeout_ms: u64,
    #[serde(default = "EngineConfig::default_moon_refresh_secs")]
    pub moon_refresh_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            secret_probability: Self::default_secret_probability(),
            daily_crystal_limit: Self::default_daily_crystal_limit(),
            spread_free_limit: Self::default_spread_free_limit(),
            chat_daily_limit: Self::default_chat_daily_limit(),
            crystal_collection_cap: Self::default_crystal_cap(),
            affirmation_cap: Self::default_affirmation_cap(),
            wish_cap: Self::default_wish_cap(),
            completion_timeout_ms: Self::default_completion_timeout_ms(),
            moon_refresh_secs: Self::default_moon_refresh_secs(),
        }
    }
}

impl EngineConfig {
    const fn default_secret_probability() -> f64 {
        SECRET_HIT_PROBABILITY
    }

    const fn default_daily_crystal_limit() -> u32 {
        DAILY_CRYSTAL_LIMIT
    }

    const fn default_spread_free_limit() -> u32 {
        SPREAD_FREE_LIMIT
    }

    const fn default_chat_daily_limit() -> u32 {
        CHAT_DAILY_LIMIT
    }

    const fn default_crystal_cap() -> usize {
        CRYSTAL_COLLECTION_CAP
    }

    const fn default_affirmation_cap() -> usize {
        AFFIRMATION_CAP
    }

    const fn default_wish_cap() -> usize {
        WISH_CAP
    }

    const fn default_completion_timeout_ms() -> u64 {
        COMPLETION_TIMEOUT_MS
    }

    const fn default_moon_refresh_secs() -> u64 {
        MOON_REFRESH_SECS
    }

    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed JSON and the matching bound
    /// violation for out-of-range values.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every bound.
    ///
    /// # Errors
    ///
    /// Returns the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.secret_probability) {
            return Err(ConfigError::ProbabilityRange {
                field: "secretProbability",
                min: 0.0,
                max: 1.0,
                value: self.secret_probability,
            });
        }
        Self::at_least("crystalCollectionCap", 1, widen(self.crystal_collection_cap))?;
        Self::at_least("affirmationCap", 1, widen(self.affirmation_cap))?;
        Self::at_least("wishCap", 1, widen(self.wish_cap))?;
        Self::at_least("completionTimeoutMs", 1, self.completion_timeout_ms)?;
        Self::at_least("moonRefreshSecs", 1, self.moon_refresh_secs)?;
        Ok(())
    }

    fn at_least(field: &'static str, min: u64, value: u64) -> Result<(), ConfigError> {
        if value < min {
            return Err(ConfigError::MinViolation { field, min, value });
        }
        Ok(())
    }

    #[must_use]
    pub const fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    #[must_use]
    pub const fn moon_refresh(&self) -> Duration {
        Duration::from_secs(self.moon_refresh_secs)
    }

    #[must_use]
    pub const fn grant_policy(&self) -> GrantPolicy {
        GrantPolicy {
            daily_limit: self.daily_crystal_limit,
            collection_cap: self.crystal_collection_cap,
        }
    }
}
