//! Error types for dupewatch-oracle

use thiserror::Error;

/// Errors raised while talking to the classification oracle
#[derive(Error, Debug)]
pub enum OracleError {
    /// The API answered with a non-success status
    #[error("oracle returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The API answered but without any text content
    #[error("oracle returned no text content")]
    EmptyResponse,

    /// Missing API key or similar
    #[error("oracle not configured: {0}")]
    Config(String),

    /// Request or response (de)serialization failed
    #[error("oracle serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        OracleError::Transport(err.to_string())
    }
}

/// Result type for oracle operations
pub type OracleResult<T> = std::result::Result<T, OracleError>;
