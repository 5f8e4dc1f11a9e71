//! Error types for the relay

use axum::{
    http::{HeaderValue, StatusCode, header::CONTENT_RANGE},
    response::{IntoResponse, Response},
};
use musserver::error_response;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while serving a relay request
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Malformed caller input, detected before any upstream call
    #[error("{message}: {details}")]
    Validation { message: String, details: String },

    /// Nothing matched (search without results, missing upstream resource)
    #[error("{message}: {details}")]
    NotFound { message: String, details: String },

    /// Range outside of the resource
    #[error("range not satisfiable for a resource of {total} bytes")]
    RangeNotSatisfiable { total: u64 },

    /// Upstream unavailable, refused, or its format could not be resolved
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Catalogue file could not be parsed
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    pub fn validation(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Yaml(_) | Self::Io(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::range::RangeError> for RelayError {
    fn from(e: crate::range::RangeError) -> Self {
        Self::RangeNotSatisfiable { total: e.total }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation { message, details } | Self::NotFound { message, details } => {
                error_response(status, message, Some(details))
            }
            Self::RangeNotSatisfiable { total } => {
                let mut response = error_response(
                    status,
                    "Range not satisfiable",
                    Some(format!("Resource length is {} bytes", total)),
                );
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total)) {
                    response.headers_mut().insert(CONTENT_RANGE, value);
                }
                response
            }
            other => {
                tracing::error!("Relay request failed: {}", other);
                error_response(status, "Error processing request", Some(other.to_string()))
            }
        }
    }
}
