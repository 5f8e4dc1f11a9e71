//! # musclient - Resilient HTTP client
//!
//! Executes logical requests (method, path, headers, JSON body) against an
//! ordered list of backend origins, retrying with linear backoff and failing
//! over to the next origin, circularly, until one answers with a 2xx status.
//!
//! - [`OriginSet`]: origins and the shared active pointer
//! - [`RetryPolicy`]: attempt budget and backoff
//! - [`Transport`]: one exchange against one origin ([`ReqwestTransport`] by default)
//! - [`ResilientClient`]: the retry loop
//!
//! ```no_run
//! use musclient::{ClientRequest, ResilientClient};
//! use std::time::Duration;
//!
//! # async fn example() -> musclient::Result<()> {
//! let client = ResilientClient::builder()
//!     .origins(["https://app.example", "http://localhost:3000"])
//!     .max_retries_per_origin(3)
//!     .base_delay(Duration::from_millis(1000))
//!     .build()?;
//!
//! let request = ClientRequest::post_json("/musicas", &serde_json::json!({
//!     "method": "audio_stream",
//!     "data": {"url": "https://media.example/watch?v=abc"}
//! }))?;
//! let stream = client.execute(&request).await?.into_stream();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config_ext;
pub mod error;
pub mod origin;
pub mod request;
pub mod retry;
pub mod transport;

pub use client::{ClientBuilder, ClientResponse, ResilientClient};
pub use config_ext::ClientConfigExt;
pub use error::{AttemptError, ClientError, Result};
pub use origin::OriginSet;
pub use request::ClientRequest;
pub use retry::{RetryAttempt, RetryPolicy};
pub use transport::{ByteStream, ReqwestTransport, Transport, TransportResponse};
