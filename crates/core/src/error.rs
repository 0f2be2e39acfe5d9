// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type.
///
/// Fetch failures are NOT represented here: they have their own closed
/// taxonomy ([`crate::port::FetchError`]) and never cross the refresh-loop
/// boundary. This type covers everything else (configuration, IO, wiring).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// From implementation for infra crates (to avoid circular dependency)
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Internal(err)
    }
}
