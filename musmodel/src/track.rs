//! Track descriptor

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Accepts a JSON string or number for identifiers
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Ok(s),
        StringOrNumber::Number(n) => Ok(n.to_string()),
    }
}

/// Accepts a duration as seconds (number or numeric string); null means unknown
fn deserialize_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Duration {
        Int(u64),
        Float(f64),
        String(String),
    }

    match Option::<Duration>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Duration::Int(i)) => Ok(i),
        Some(Duration::Float(f)) if f >= 0.0 => Ok(f as u64),
        Some(Duration::Float(f)) => Err(D::Error::custom(format!("negative duration {f}"))),
        Some(Duration::String(s)) if s.trim().is_empty() => Ok(0),
        Some(Duration::String(s)) => s.trim().parse::<u64>().map_err(D::Error::custom),
    }
}

/// Immutable descriptor of a playable track
///
/// `id` is unique within a queue. `duration_seconds` is 0 when the source
/// does not know it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Track {
    #[serde(rename = "id_song", deserialize_with = "deserialize_string_or_number")]
    pub id: String,
    #[serde(rename = "song_name")]
    pub title: String,
    #[serde(rename = "song_artist", default)]
    pub artist: String,
    #[serde(
        rename = "song_duration",
        default,
        deserialize_with = "deserialize_duration"
    )]
    pub duration_seconds: u64,
    #[serde(rename = "song_thumbnail", default)]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "song_url")]
    pub source_url: String,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_seconds: u64,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_seconds,
            thumbnail_url: None,
            source_url: source_url.into(),
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Duration as `M:SS` or `H:MM:SS`
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

/// Formats a number of seconds as `M:SS`, or `H:MM:SS` past one hour
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
