//! Configuration for the Extractor

use crate::postprocess::PostProcessConfig;
use attest_gatekeeper::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Lines per chunk
    pub chunk_size: usize,

    /// Lines shared by consecutive chunks
    pub chunk_overlap: usize,

    /// Maximum chunks processed concurrently
    pub max_workers: usize,

    /// Maximum time for a single proposer call (seconds)
    pub proposer_timeout_secs: u64,

    /// Quote validation settings
    pub validation: ValidationConfig,

    /// Post-processing settings
    pub postprocess: PostProcessConfig,
}

impl ExtractorConfig {
    /// Get the proposer timeout as a Duration
    pub fn proposer_timeout(&self) -> Duration {
        Duration::from_secs(self.proposer_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        if self.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }
        if self.proposer_timeout_secs == 0 {
            return Err("proposer_timeout_secs must be greater than 0".to_string());
        }
        self.validation.validate()?;
        self.postprocess.validate()?;
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            max_workers: 5,
            proposer_timeout_secs: 600,
            validation: ValidationConfig::default(),
            postprocess: PostProcessConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: smaller chunks, more workers, shorter timeouts
    pub fn aggressive() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            max_workers: 8,
            proposer_timeout_secs: 300,
            validation: ValidationConfig::strict(),
            postprocess: PostProcessConfig::default(),
        }
    }

    /// Lenient preset: larger chunks, fewer workers, longer timeouts
    pub fn lenient() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 300,
            max_workers: 3,
            proposer_timeout_secs: 900,
            validation: ValidationConfig::lenient(),
            postprocess: PostProcessConfig::default(),
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
