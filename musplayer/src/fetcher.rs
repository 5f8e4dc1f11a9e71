//! Obtaining a playable byte stream for a track

use crate::error::FetchError;
use async_trait::async_trait;
use musclient::{ByteStream, ClientRequest, ResilientClient};
use musmodel::{RelayMethod, RelayRequest, Track};
use tracing::debug;

/// Path of the relay endpoint on every origin
pub const RELAY_PATH: &str = "/musicas";

/// Turns a track into bytes the sink can decode
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, track: &Track) -> Result<ByteStream, FetchError>;
}

/// Fetches through the backend relay, with retry and origin failover
///
/// Sends `{"method": "audio_stream", "data": {"url": <source_url>}}` to
/// `POST /musicas` and hands back the response body unread.
#[derive(Debug, Clone)]
pub struct RelayFetcher {
    client: ResilientClient,
    method: RelayMethod,
}

impl RelayFetcher {
    pub fn new(client: ResilientClient) -> Self {
        Self {
            client,
            method: RelayMethod::AudioStream,
        }
    }

    /// Fetch the muxed video encoding instead of audio only
    pub fn video(mut self) -> Self {
        self.method = RelayMethod::VideoStream;
        self
    }
}

#[async_trait]
impl StreamFetcher for RelayFetcher {
    async fn fetch(&self, track: &Track) -> Result<ByteStream, FetchError> {
        if track.source_url.trim().is_empty() {
            return Err(FetchError::MissingLocator(track.id.clone()));
        }

        let body = RelayRequest::for_url(self.method, track.source_url.as_str());
        let request = ClientRequest::post_json(RELAY_PATH, &body)?;
        let response = self.client.execute(&request).await?;

        debug!(
            track = %track.id,
            origin = %response.origin,
            attempts = response.attempts.len(),
            "Relay stream opened"
        );
        Ok(response.into_stream())
    }
}
