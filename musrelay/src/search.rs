//! Search collaborator behind the `search` relay method

use crate::error::Result;
use async_trait::async_trait;
use musmodel::Track;
use std::path::Path;

/// Returns track descriptors matching a free-text term
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<Track>>;
}

/// In-memory catalogue, matched case-insensitively on title and artist
#[derive(Debug, Clone, Default)]
pub struct CatalogSearch {
    tracks: Vec<Track>,
}

impl CatalogSearch {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Loads a YAML list of tracks (`id_song`, `song_name`, …)
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let tracks: Vec<Track> = serde_yaml::from_str(&data)?;
        Ok(Self::new(tracks))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track whose `source_url` is `url`
    pub fn find_by_url(&self, url: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.source_url == url)
    }
}

#[async_trait]
impl SearchProvider for CatalogSearch {
    async fn search(&self, term: &str, limit: usize) -> Result<Vec<Track>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .tracks
            .iter()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle) || t.artist.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
