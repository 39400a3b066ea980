//! Error types for the Extractor

use attest_domain::ProviderError;
use attest_gatekeeper::GatekeeperError;
use attest_store::StoreError;
use thiserror::Error;

/// Errors that can occur during an extraction run
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Invalid chunking, worker, timeout or threshold settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session store failure outside a single chunk
    #[error("Store error: {0}")]
    Store(String),

    /// Session was created for a different document or chunking
    #[error("Session conflict: {0}")]
    SessionConflict(String),

    /// Fact proposer or quote recoverer error
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A worker task could not be scheduled or joined
    #[error("Task error: {0}")]
    Task(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}

impl From<GatekeeperError> for ExtractorError {
    fn from(e: GatekeeperError) -> Self {
        match e {
            GatekeeperError::Config(msg) => ExtractorError::Config(msg),
        }
    }
}

impl From<StoreError> for ExtractorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionConflict { .. } => ExtractorError::SessionConflict(e.to_string()),
            other => ExtractorError::Store(other.to_string()),
        }
    }
}
