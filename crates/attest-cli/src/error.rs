//! Errors surfaced to the terminal.

use attest_extractor::ExtractorError;
use attest_store::StoreError;
use thiserror::Error;

/// Result alias used by every command.
pub type Result<T> = std::result::Result<T, CliError>;

/// Anything a command can fail with. `main` prints it and exits 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad config file or bad setting override
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline refused to start or lost its session
    #[error(transparent)]
    Extractor(#[from] ExtractorError),

    /// Session directory could not be read or written
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reading the document or writing an output file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Facts file or JSON output could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file is not valid TOML
    #[error("Config file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Arguments that parse but make no sense (empty document, unknown file shape)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
