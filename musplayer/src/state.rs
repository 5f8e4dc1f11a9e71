//! Playback state owned by the engine

use musmodel::{Track, format_duration};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the current track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No track loaded
    #[default]
    Idle,
    /// Fetch in flight
    Loading,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// What happens when the current track or the queue finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// `Off → All → One → Off`
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

/// Snapshot of the player
///
/// Handed out by value: writing to a copy never reaches the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub progress_seconds: f64,
    pub duration_seconds: u64,
    /// 0..=100
    pub volume: u8,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl PlaybackState {
    pub fn new(volume: u8) -> Self {
        Self {
            status: PlaybackStatus::Idle,
            progress_seconds: 0.0,
            duration_seconds: 0,
            volume: volume.min(100),
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }

    /// Progress in percent of the duration, 0 when the duration is unknown
    pub fn progress_percent(&self) -> f64 {
        if self.duration_seconds == 0 {
            return 0.0;
        }
        (self.progress_seconds / self.duration_seconds as f64 * 100.0).clamp(0.0, 100.0)
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(crate::config_ext::DEFAULT_VOLUME)
    }
}

/// What a UI needs to render the player bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub current_index: Option<usize>,
    pub queue_len: usize,
    pub progress_seconds: f64,
    pub progress_percent: f64,
    pub duration_seconds: u64,
    /// `M:SS` / `H:MM:SS`
    pub elapsed: String,
    pub total: String,
    pub volume: u8,
    pub muted: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub favorite: bool,
}

impl PlayerSnapshot {
    pub(crate) fn build(
        state: &PlaybackState,
        track: Option<&Track>,
        current_index: Option<usize>,
        queue_len: usize,
        muted: bool,
        favorite: bool,
    ) -> Self {
        Self {
            status: state.status,
            track: track.cloned(),
            current_index,
            queue_len,
            progress_seconds: state.progress_seconds,
            progress_percent: state.progress_percent(),
            duration_seconds: state.duration_seconds,
            elapsed: format_duration(state.progress_seconds as u64),
            total: format_duration(state.duration_seconds),
            volume: state.volume,
            muted,
            shuffle: state.shuffle,
            repeat: state.repeat,
            favorite,
        }
    }
}
