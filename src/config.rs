//! Engine Configuration
//!
//! `PartConfig` holds the values fixed at construction: sample rate, strike
//! debouncing and the noise seed. Every field has a default, so a config
//! file only needs to name what it changes.

use crate::MAX_BLOCK_SIZE;
use serde::{Deserialize, Serialize};

#[cfg(feature = "alloc")]
use alloc::string::{String, ToString};

/// Default noise seed
pub const DEFAULT_SEED: u64 = 0x5EED_0F_C0FFEE;

/// Construction-time settings for a `Part`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    /// Audio sample rate in Hz
    pub sample_rate: f64,
    /// Minimum time between two accepted strikes, in seconds
    pub strum_inhibit_time: f64,
    /// Inhibit stretch applied when strikes come from detected onsets
    pub onset_inhibit_multiplier: u32,
    /// Pitch change (semitones) that strikes when only pitch is patched
    pub note_change_threshold: f64,
    /// Seed for the excitation noise streams
    pub seed: u64,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            strum_inhibit_time: 0.01,
            onset_inhibit_multiplier: 4,
            note_change_threshold: 0.4,
            seed: DEFAULT_SEED,
        }
    }
}

impl PartConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the seed with one drawn from the operating system
    #[cfg(feature = "std")]
    pub fn with_random_seed(self) -> Self {
        self.with_seed(rand::random::<u64>())
    }

    /// Rate at which per-block state advances, in Hz
    pub fn block_rate(&self) -> f64 {
        self.sample_rate / MAX_BLOCK_SIZE as f64
    }

    /// Copy with every field forced into a usable range
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let sample_rate = if self.sample_rate.is_finite() && self.sample_rate > 0.0 {
            self.sample_rate
        } else {
            log::warn!(
                "invalid sample rate {}, using {}",
                self.sample_rate,
                defaults.sample_rate
            );
            defaults.sample_rate
        };
        let strum_inhibit_time = if self.strum_inhibit_time.is_finite() {
            self.strum_inhibit_time.clamp(0.001, 1.0)
        } else {
            defaults.strum_inhibit_time
        };
        let note_change_threshold = if self.note_change_threshold.is_finite() {
            self.note_change_threshold.max(0.0)
        } else {
            defaults.note_change_threshold
        };

        Self {
            sample_rate,
            strum_inhibit_time,
            onset_inhibit_multiplier: self.onset_inhibit_multiplier.max(1),
            note_change_threshold,
            seed: self.seed,
        }
    }

    /// Parse a JSON config. Missing fields take their defaults; the sample
    /// rate must be positive.
    #[cfg(feature = "alloc")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(config.sample_rate));
        }
        Ok(config.sanitized())
    }

    #[cfg(feature = "alloc")]
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Error type for configuration parsing
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Malformed JSON or mistyped field
    #[cfg(feature = "alloc")]
    Parse(String),
    /// Sample rate was zero, negative or not finite
    InvalidSampleRate(f64),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            #[cfg(feature = "alloc")]
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidSampleRate(rate) => write!(f, "Invalid sample rate: {}", rate),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
