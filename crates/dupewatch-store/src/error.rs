//! Error types for dupewatch-store

use thiserror::Error;

/// Errors raised by issue-store and project-board collaborators
#[derive(Error, Debug)]
pub enum StoreError {
    /// The remote answered with a non-success status
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// A GraphQL response carried an `errors` array
    #[error("GraphQL errors: {0}")]
    GraphQl(String),

    /// The response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A record the caller asked for does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The client was built with missing or invalid settings
    #[error("store not configured: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether this error means "the thing does not exist" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::Status { status: 404, .. }
        )
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_404_counts_as_not_found() {
        let err = StoreError::Status {
            status: 404,
            url: "https://api.github.com/orgs/o/teams/staff/memberships/x".to_string(),
            message: "Not Found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_other_errors_are_not_not_found() {
        assert!(!StoreError::Transport("connection reset".to_string()).is_not_found());
        assert!(!StoreError::Status {
            status: 500,
            url: "u".to_string(),
            message: "boom".to_string(),
        }
        .is_not_found());
        assert!(StoreError::NotFound("issue #1".to_string()).is_not_found());
    }
}
