use thiserror::Error;

/// Raised when a [`Validator`](crate::Validator) cannot be built
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Thresholds or window sizes out of range
    #[error("Invalid validation settings: {0}")]
    Config(String),
}
