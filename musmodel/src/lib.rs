//! # musmodel - Shared data model of Musica
//!
//! Types exchanged between the relay server, the resilient client and the
//! playback engine. The JSON field names follow the wire format used by the
//! relay endpoint (`id_song`, `song_name`, …) so that tracks returned by a
//! search can be posted back unchanged to the persistence endpoints.

pub mod request;
pub mod track;

pub use request::{RelayData, RelayMethod, RelayRequest, UnknownMethod};
pub use track::{Track, format_duration};
