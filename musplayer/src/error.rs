//! Error types for the player

use musclient::ClientError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Failure reported by the media sink (decode error, device gone…)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure of a backend call made on behalf of the player
#[derive(Debug, Error)]
pub enum FetchError {
    /// Track without a source locator
    #[error("track {0} has no source URL")]
    MissingLocator(String),

    /// The resilient client gave up
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FetchError {
    /// Worth retrying on the next user action
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MissingLocator(_) => false,
            Self::Client(e) => e.is_transient(),
        }
    }
}

/// Errors surfaced by [`crate::PlaybackEngine`]
///
/// The engine state is always left consistent (`Idle` after a failed load);
/// the error only tells the caller what happened.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("cannot fetch media: {0}")]
    Fetch(#[from] FetchError),

    #[error("media sink error: {0}")]
    Sink(#[from] SinkError),

    /// A newer load started before this one finished
    #[error("load of track {0} superseded by a newer one")]
    Superseded(String),
}
