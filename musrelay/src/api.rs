//! `POST /musicas`: search, media info and byte streaming in one endpoint

use crate::error::{RelayError, Result};
use crate::relay::StreamRelay;
use crate::resolver::MediaKind;
use crate::search::SearchProvider;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, header::RANGE},
    response::{IntoResponse, Response},
    routing::post,
};
use musmodel::{RelayData, RelayMethod, RelayRequest, Track};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{OpenApi, ToSchema};

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Shared state of the relay routes
#[derive(Clone)]
pub struct RelayState {
    pub relay: StreamRelay,
    pub search: Arc<dyn SearchProvider>,
    pub default_limit: usize,
}

impl RelayState {
    pub fn new(relay: StreamRelay, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            relay,
            search,
            default_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }
}

/// Answer of the `search` method
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub termo_busca: String,
    pub total: usize,
    pub musicas: Vec<Track>,
}

/// Answer of the `audio_info` and `video_info` methods
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    #[serde(flatten)]
    pub track: Track,
    pub formato: String,
    pub qualidade: Option<String>,
    pub tamanho: Option<u64>,
}

/// Crée le router du relais
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/musicas", post(musicas))
        .with_state(state)
}

/// POST /musicas
///
/// Streaming methods honour the `Range` request header.
#[utoipa::path(
    post,
    path = "/musicas",
    request_body = RelayRequest,
    responses(
        (status = 200, description = "Search results, media info, or the whole media body"),
        (status = 206, description = "Requested byte window of the media"),
        (status = 400, description = "Missing or invalid method, data, URL or search term", body = musserver::ErrorBody),
        (status = 404, description = "No search result or unknown media", body = musserver::ErrorBody),
        (status = 416, description = "Range outside of the media", body = musserver::ErrorBody),
        (status = 502, description = "Upstream unavailable", body = musserver::ErrorBody)
    ),
    tag = "musicas"
)]
pub async fn musicas(
    State(state): State<RelayState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) =
        payload.map_err(|e| RelayError::validation("Invalid request body", e.body_text()))?;

    let (Some(method), Some(data)) = (request.method.as_deref(), request.data) else {
        return Err(RelayError::validation(
            "Data not provided",
            "Both method and data are required",
        ));
    };

    let method: RelayMethod = method
        .parse()
        .map_err(|e: musmodel::UnknownMethod| RelayError::validation("Invalid method", e.to_string()))?;
    debug!(%method, "Relay request");

    match method {
        RelayMethod::Search => search(&state, data).await.map(IntoResponse::into_response),
        RelayMethod::AudioInfo | RelayMethod::VideoInfo => {
            info(&state, method, data).await.map(IntoResponse::into_response)
        }
        RelayMethod::AudioStream | RelayMethod::VideoStream => {
            let range = headers.get(RANGE).and_then(|v| v.to_str().ok());
            state
                .relay
                .relay(data.url.as_deref(), MediaKind::from_method(method), range)
                .await
                .map(IntoResponse::into_response)
        }
    }
}

async fn search(state: &RelayState, data: RelayData) -> Result<Json<SearchResponse>> {
    let term = data
        .termo
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelayError::validation("Search term not provided", "termo is required"))?;
    let limit = data
        .limite
        .filter(|l| *l > 0)
        .unwrap_or(state.default_limit);

    let tracks = state.search.search(&term, limit).await?;
    if tracks.is_empty() {
        return Err(RelayError::not_found(
            "No results found",
            format!("The search for {:?} returned nothing", term),
        ));
    }

    Ok(Json(SearchResponse {
        termo_busca: term,
        total: tracks.len(),
        musicas: tracks,
    }))
}

async fn info(state: &RelayState, method: RelayMethod, data: RelayData) -> Result<Json<MediaInfo>> {
    let media = state
        .relay
        .resolve(data.url.as_deref(), MediaKind::from_method(method))
        .await?;

    let mut track = media.track;
    track.source_url = media.url.to_string();

    Ok(Json(MediaInfo {
        track,
        formato: media.container,
        qualidade: media.quality,
        tamanho: media.total_length,
    }))
}

/// API OpenAPI du relais
#[derive(OpenApi)]
#[openapi(
    paths(musicas),
    components(schemas(
        RelayRequest,
        RelayData,
        Track,
        SearchResponse,
        MediaInfo,
        musserver::ErrorBody
    )),
    tags((name = "musicas", description = "Media search, info and range-aware streaming"))
)]
pub struct RelayApiDoc;
