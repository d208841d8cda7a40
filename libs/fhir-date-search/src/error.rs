//! Error types for date search parameters

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Date search errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid date search parameter: {value} ({reason})")]
    InvalidParameter { value: String, reason: &'static str },

    #[error("Unsupported date search modifier: {0}")]
    UnsupportedModifier(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl Error {
    pub(crate) fn invalid(value: &str, reason: &'static str) -> Self {
        Error::InvalidParameter {
            value: value.to_string(),
            reason,
        }
    }

    /// True for faults caused by the request value itself (never retryable).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter { .. } | Error::UnsupportedModifier(_)
        )
    }
}
