//! Error types for the resilient client

use std::time::Duration;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of a single attempt against one origin
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// DNS failure, refused or reset connection, timeout
    #[error("network error: {0}")]
    Network(String),

    /// 429 Too Many Requests
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-2xx status
    #[error("HTTP status {status}")]
    Status { status: u16 },
}

impl AttemptError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }
}

/// Errors returned by [`crate::ResilientClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Every attempt of the retry budget failed
    #[error("request failed after {attempts} attempt(s) over {origins_tried} origin(s): {last}")]
    Exhausted {
        attempts: usize,
        origins_tried: usize,
        last: AttemptError,
    },

    /// The origin list is empty
    #[error("no origin configured")]
    NoOrigins,

    /// An origin is not a valid base URL
    #[error("invalid origin {origin}: {reason}")]
    InvalidOrigin { origin: String, reason: String },

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body could not be read
    #[error("body read error: {0}")]
    Body(#[from] std::io::Error),
}

impl ClientError {
    /// True when the same call is likely to succeed later, once an origin recovers
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Exhausted { last, .. } => match last {
                AttemptError::Network(_) | AttemptError::RateLimited { .. } => true,
                AttemptError::Status { status } => *status >= 500 || *status == 408,
            },
            Self::Body(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let exhausted = |last| ClientError::Exhausted {
            attempts: 3,
            origins_tried: 1,
            last,
        };

        assert!(exhausted(AttemptError::network("refused")).is_transient());
        assert!(exhausted(AttemptError::RateLimited { retry_after: None }).is_transient());
        assert!(exhausted(AttemptError::Status { status: 503 }).is_transient());
        assert!(!exhausted(AttemptError::Status { status: 404 }).is_transient());
        assert!(!ClientError::NoOrigins.is_transient());
    }
}
