//! Persistence boundary: play history and favourites

use crate::error::FetchError;
use async_trait::async_trait;
use musclient::{ClientRequest, ResilientClient};
use musmodel::Track;
use serde::Deserialize;
use serde_json::json;

pub const HISTORY_PATH: &str = "/users/history";
pub const FAVORITES_PATH: &str = "/users/favorites";

/// User library as seen by the player
#[async_trait]
pub trait Library: Send + Sync {
    /// Called once playback of `track` actually starts
    async fn record_play(&self, track: &Track) -> Result<(), FetchError>;

    /// Tracks marked as favourite
    async fn favorites(&self) -> Result<Vec<Track>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct FavoritesResponse {
    #[serde(default)]
    favoritos: Vec<Track>,
}

/// Library stored by the backend, reached through the resilient client
#[derive(Debug, Clone)]
pub struct RemoteLibrary {
    client: ResilientClient,
    user_id: String,
}

impl RemoteLibrary {
    pub fn new(client: ResilientClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl Library for RemoteLibrary {
    async fn record_play(&self, track: &Track) -> Result<(), FetchError> {
        let body = json!({
            "method": "add",
            "data": {"user": self.user_id, "songs": [track]},
        });
        let request = ClientRequest::post_json(HISTORY_PATH, &body)?;
        self.client.execute(&request).await?;
        Ok(())
    }

    async fn favorites(&self) -> Result<Vec<Track>, FetchError> {
        let body = json!({"method": "list", "data": {"user": self.user_id}});
        let response: FavoritesResponse = self.client.post_json(FAVORITES_PATH, &body).await?;
        Ok(response.favoritos)
    }
}
