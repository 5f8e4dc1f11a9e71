//! Boundary with the platform decoder that renders media

use crate::error::SinkError;
use async_trait::async_trait;
use musclient::ByteStream;
use musmodel::Track;
use std::fmt;

/// Playable byte source handed to the sink
pub struct MediaSource {
    pub track: Track,
    pub stream: ByteStream,
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSource")
            .field("track", &self.track.id)
            .finish_non_exhaustive()
    }
}

/// Event reported by the sink
///
/// Every event carries the generation passed to [`MediaSink::attach`], so
/// late events of a replaced track are recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Metadata decoded, duration known
    LoadedMetadata { generation: u64, duration_seconds: u64 },
    /// Periodic position report
    TimeUpdate { generation: u64, position_seconds: f64 },
    /// End of media, once per attached source
    Ended { generation: u64 },
    /// The delivered bytes cannot be played
    Error { generation: u64, message: String },
}

impl SinkEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::LoadedMetadata { generation, .. }
            | Self::TimeUpdate { generation, .. }
            | Self::Ended { generation }
            | Self::Error { generation, .. } => *generation,
        }
    }
}

/// Audio/video output driven by the engine
///
/// Implementations push [`SinkEvent`]s into the channel given to
/// [`crate::PlaybackEngine::spawn_event_loop`].
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Replaces the current source; consumption of the previous stream stops
    ///
    /// Generations only grow. A sink must refuse a source whose generation
    /// is lower than the last one it attached and keep the newer source.
    /// The engine may also drop the returned future when the load is
    /// superseded, so the source must be swapped in one step at the end.
    async fn attach(&self, generation: u64, source: MediaSource) -> Result<(), SinkError>;

    async fn play(&self) -> Result<(), SinkError>;

    async fn pause(&self) -> Result<(), SinkError>;

    async fn seek(&self, position_seconds: f64) -> Result<(), SinkError>;

    async fn set_volume(&self, volume: u8) -> Result<(), SinkError>;

    /// Current position, read by the fallback progress poll
    fn position(&self) -> Option<f64>;
}
