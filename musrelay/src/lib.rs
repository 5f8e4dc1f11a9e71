//! # musrelay - Byte-range aware media relay
//!
//! Serves `POST /musicas`, the single endpoint of the backend:
//!
//! | method         | data      | answer                                   |
//! |----------------|-----------|------------------------------------------|
//! | `search`       | `termo`, `limite` | `{termo_busca, total, musicas}`  |
//! | `audio_info`   | `url`     | track descriptor + format, quality, size |
//! | `video_info`   | `url`     | idem for the muxed encoding              |
//! | `audio_stream` | `url`     | `audio/mp3` bytes, 200 or 206            |
//! | `video_stream` | `url`     | `video/mp4` bytes, 200 or 206            |
//!
//! Streaming honours `Range: bytes=start-end`, `bytes=start-` and
//! `bytes=-n`. Bytes are piped from the upstream as they arrive; when the
//! client goes away the upstream connection is dropped with it.
//!
//! The upstream side is split into collaborators:
//! [`MediaResolver`] (encoding and length), [`CredentialProvider`]
//! (upstream headers) and [`SearchProvider`] (free-text search).
//!
//! ```rust,ignore
//! use musrelay::{RelayState, create_router};
//!
//! let state = RelayState::from_config(&musconfig::get_config())?;
//! server.add_router("/", create_router(state)).await;
//! ```

pub mod api;
pub mod config_ext;
pub mod credentials;
pub mod error;
pub mod range;
pub mod relay;
pub mod resolver;
pub mod search;

pub use api::{MediaInfo, RelayApiDoc, RelayState, SearchResponse, create_router};
pub use config_ext::RelayConfigExt;
pub use credentials::{CredentialProvider, StaticCredentials};
pub use error::{RelayError, Result};
pub use range::{ByteRange, RangeError, RangeRequest};
pub use relay::{ByteStream, RelayResponse, StreamRelay, byte_window, validate_locator};
pub use resolver::{HttpResolver, MediaKind, MediaResolver, ResolvedMedia};
pub use search::{CatalogSearch, SearchProvider};
