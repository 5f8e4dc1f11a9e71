//! Resolution of an upstream locator into a playable resource

use crate::credentials::CredentialProvider;
use crate::error::{RelayError, Result};
use crate::range::total_from_content_range;
use crate::search::CatalogSearch;
use async_trait::async_trait;
use musmodel::{RelayMethod, Track};
use reqwest::{
    StatusCode,
    header::{CONTENT_RANGE, CONTENT_TYPE, RANGE},
};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Which encoding the caller wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Audio-only encoding
    Audio,
    /// Muxed audio and video
    Video,
}

impl MediaKind {
    pub fn from_method(method: RelayMethod) -> Self {
        if method.is_audio() {
            Self::Audio
        } else {
            Self::Video
        }
    }

    /// `Content-Type` of relayed bytes
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Audio => "audio/mp3",
            Self::Video => "video/mp4",
        }
    }

    fn default_container(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }
}

/// A resource ready to be streamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    /// Direct URL of the chosen encoding
    pub url: Url,
    pub kind: MediaKind,
    /// Total byte length, when the upstream reports it
    pub total_length: Option<u64>,
    /// Container name (`mp4`, `webm`, `mpeg`…)
    pub container: String,
    pub quality: Option<String>,
    /// Descriptor of the track behind the locator
    pub track: Track,
}

/// Picks the encoding for a locator and learns its length
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, locator: &Url, kind: MediaKind) -> Result<ResolvedMedia>;
}

/// Resolver for locators that already point at a media file
///
/// The locator names the encoding itself, so there is no audio-only or
/// muxed variant to choose from: `kind` only sets the relayed
/// `Content-Type` and the container reported when the upstream sends none.
/// Resolvers for pages with several encodings pick one from `kind`.
///
/// Probes the upstream with `Range: bytes=0-0` and reads the total length
/// from `Content-Range`, or from `Content-Length` when the upstream ignores
/// ranges. Track metadata comes from the catalogue when the locator is
/// known there.
#[derive(Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    catalog: Option<Arc<CatalogSearch>>,
}

impl HttpResolver {
    pub fn new(client: reqwest::Client, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client,
            credentials,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<CatalogSearch>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    fn describe(&self, locator: &Url) -> Track {
        if let Some(track) = self
            .catalog
            .as_ref()
            .and_then(|c| c.find_by_url(locator.as_str()))
        {
            return track.clone();
        }

        let name = locator
            .path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or("media");
        let id = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
        Track::new(id, id, "", 0, locator.as_str())
    }
}

/// `audio/mpeg; charset=x` → `mpeg`
fn container_from_content_type(value: &str) -> Option<String> {
    let essence = value.split(';').next()?.trim();
    let (_, subtype) = essence.split_once('/')?;
    (!subtype.is_empty()).then(|| subtype.to_lowercase())
}

#[async_trait]
impl MediaResolver for HttpResolver {
    async fn resolve(&self, locator: &Url, kind: MediaKind) -> Result<ResolvedMedia> {
        let headers = self.credentials.headers(locator).await?;
        let response = self
            .client
            .get(locator.clone())
            .headers(headers)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| RelayError::upstream(format!("cannot reach {}: {}", locator, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(RelayError::not_found(
                "Media not found",
                format!("{} answered {}", locator, status),
            ));
        }
        if !status.is_success() {
            return Err(RelayError::upstream(format!(
                "{} answered {}",
                locator, status
            )));
        }

        let total_length = if status == StatusCode::PARTIAL_CONTENT {
            response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(total_from_content_range)
        } else {
            response.content_length()
        };

        let container = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(container_from_content_type)
            .unwrap_or_else(|| kind.default_container().to_string());

        debug!(locator = %locator, ?total_length, %container, "Resolved media");

        Ok(ResolvedMedia {
            url: locator.clone(),
            kind,
            total_length,
            container,
            quality: None,
            track: self.describe(locator),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_from_content_type() {
        assert_eq!(
            container_from_content_type("audio/MPEG; charset=binary").as_deref(),
            Some("mpeg")
        );
        assert_eq!(container_from_content_type("garbage"), None);
    }

    #[test]
    fn test_kind_from_method() {
        assert_eq!(MediaKind::from_method(RelayMethod::AudioStream), MediaKind::Audio);
        assert_eq!(MediaKind::from_method(RelayMethod::VideoInfo), MediaKind::Video);
        assert_eq!(MediaKind::Audio.content_type(), "audio/mp3");
    }

    #[test]
    fn test_describe_unknown_locator() {
        let resolver = HttpResolver::new(
            reqwest::Client::new(),
            Arc::new(crate::credentials::StaticCredentials::default()),
        );
        let track = resolver.describe(&Url::parse("http://m.test/media/song42.mp3").unwrap());
        assert_eq!(track.id, "song42");
        assert_eq!(track.source_url, "http://m.test/media/song42.mp3");
    }
}
