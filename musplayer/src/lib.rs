//! # musplayer - Playback queue state machine
//!
//! [`PlaybackEngine`] owns the play queue and the [`PlaybackState`], and is
//! the only component allowed to change them. It sequences tracks under
//! shuffle and repeat policies and reacts to events of a [`MediaSink`].
//!
//! ```text
//! Idle ──load──▶ Loading ──fetched+attached──▶ Playing ◀──▶ Paused
//!   ▲               │ failure                    │ ended
//!   └───────────────┘                            ▼
//!                                  transition table (restart / advance / stop)
//! ```
//!
//! Bytes come from a [`StreamFetcher`]; [`RelayFetcher`] asks the backend
//! relay through a [`musclient::ResilientClient`]. Plays and favourites go
//! through a [`Library`], [`RemoteLibrary`] talking to the same backend.

pub mod config_ext;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod library;
pub mod queue;
pub mod sink;
pub mod state;
pub mod transitions;

pub use config_ext::PlayerConfigExt;
pub use engine::{EngineBuilder, PlaybackEngine};
pub use error::{FetchError, PlayerError, Result, SinkError};
pub use fetcher::{RELAY_PATH, RelayFetcher, StreamFetcher};
pub use library::{Library, RemoteLibrary};
pub use queue::Queue;
pub use sink::{MediaSink, MediaSource, SinkEvent};
pub use state::{PlaybackState, PlaybackStatus, PlayerSnapshot, RepeatMode};
pub use transitions::EndedAction;
