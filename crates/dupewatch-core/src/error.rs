//! Error taxonomy for the dupewatch decision engine.

use dupewatch_oracle::OracleError;
use dupewatch_store::StoreError;

/// dupewatch core errors.
#[derive(Debug, thiserror::Error)]
pub enum DupewatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("invalid bot version timeline: {0}")]
    InvalidTimeline(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for dupewatch core operations.
pub type Result<T> = std::result::Result<T, DupewatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_is_wrapped() {
        let err: DupewatchError = StoreError::NotFound("issue #1".to_string()).into();
        assert!(err.to_string().starts_with("store error"));
        assert!(err.to_string().contains("issue #1"));
    }

    #[test]
    fn test_timeline_error_display() {
        let err = DupewatchError::InvalidTimeline("v1 listed before v2".to_string());
        assert!(err.to_string().contains("invalid bot version timeline"));
    }
}
