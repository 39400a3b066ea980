//! Validator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which way a similarity score sends a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// At or above `high_threshold`
    Accept,

    /// In `[recovery_low, high_threshold)`
    Recover,

    /// Below `recovery_low`
    Reject,
}

/// Configuration for quote validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lines searched on either side of the claimed range
    pub expansion_lines: usize,

    /// Minimum similarity for a fuzzy match to be accepted (0.0-1.0)
    pub high_threshold: f64,

    /// Minimum similarity for a near miss to be sent to recovery (0.0-1.0)
    pub recovery_low: f64,

    /// Call the quote recoverer for near misses
    pub enable_recovery: bool,

    /// Lines on either side of the claimed range handed to the recoverer
    pub recovery_window_lines: usize,

    /// Minimum confidence the recoverer must report for its quote
    pub min_recovery_confidence: f64,

    /// Timeout for a single recovery call, in seconds
    pub recovery_timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            expansion_lines: 5,
            high_threshold: 0.80,
            recovery_low: 0.40,
            enable_recovery: true,
            recovery_window_lines: 5,
            min_recovery_confidence: 0.8,
            recovery_timeout_secs: 60,
        }
    }
}

impl ValidationConfig {
    /// Create a lenient configuration (wider search, lower bars)
    pub fn lenient() -> Self {
        Self {
            expansion_lines: 10,
            high_threshold: 0.75,
            recovery_low: 0.30,
            recovery_window_lines: 20,
            min_recovery_confidence: 0.6,
            ..Self::default()
        }
    }

    /// Create a strict configuration (exact-leaning, no recovery)
    pub fn strict() -> Self {
        Self {
            expansion_lines: 2,
            high_threshold: 0.90,
            recovery_low: 0.90,
            enable_recovery: false,
            ..Self::default()
        }
    }

    /// Classify a similarity score
    ///
    /// A score exactly at a threshold belongs to the higher band.
    pub fn band(&self, score: f64) -> ScoreBand {
        if score >= self.high_threshold {
            ScoreBand::Accept
        } else if score >= self.recovery_low {
            ScoreBand::Recover
        } else {
            ScoreBand::Reject
        }
    }

    /// Get recovery timeout as Duration
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("high_threshold", self.high_threshold),
            ("recovery_low", self.recovery_low),
            ("min_recovery_confidence", self.min_recovery_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0.0, 1.0], got {}", name, value));
            }
        }

        if self.recovery_low > self.high_threshold {
            return Err(format!(
                "recovery_low ({}) must not exceed high_threshold ({})",
                self.recovery_low, self.high_threshold
            ));
        }

        if self.recovery_timeout_secs == 0 {
            return Err("recovery_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}
