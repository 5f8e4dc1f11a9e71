//! Body of the `POST /musicas` relay endpoint

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Operation requested from the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayMethod {
    Search,
    AudioInfo,
    VideoInfo,
    AudioStream,
    VideoStream,
}

impl RelayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::AudioInfo => "audio_info",
            Self::VideoInfo => "video_info",
            Self::AudioStream => "audio_stream",
            Self::VideoStream => "video_stream",
        }
    }

    /// True for the two byte-streaming operations
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::AudioStream | Self::VideoStream)
    }

    /// True when the operation targets the audio-only encoding
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::AudioInfo | Self::AudioStream)
    }
}

impl fmt::Display for RelayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown relay method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for RelayMethod {
    type Err = UnknownMethod;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Self::Search),
            "audio_info" => Ok(Self::AudioInfo),
            "video_info" => Ok(Self::VideoInfo),
            "audio_stream" => Ok(Self::AudioStream),
            "video_stream" => Ok(Self::VideoStream),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

fn deserialize_optional_limit<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrUsize {
        Number(usize),
        String(String),
    }

    match Option::<StringOrUsize>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrUsize::Number(n)) => Ok(Some(n)),
        Some(StringOrUsize::String(s)) if s.trim().is_empty() => Ok(None),
        Some(StringOrUsize::String(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
    }
}

/// Parameters of a relay request; which ones are required depends on the method
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelayData {
    /// Upstream media locator (info and stream methods)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Search term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termo: Option<String>,
    /// Maximum number of search results
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_limit"
    )]
    pub limite: Option<usize>,
}

/// `{"method": "...", "data": {...}}`
///
/// Both fields are optional at the type level so that the relay can answer
/// a missing field with its own validation error instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelayRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RelayData>,
}

impl RelayRequest {
    /// Request for an info or stream operation on `url`
    pub fn for_url(method: RelayMethod, url: impl Into<String>) -> Self {
        Self {
            method: Some(method.as_str().to_string()),
            data: Some(RelayData {
                url: Some(url.into()),
                ..Default::default()
            }),
        }
    }

    pub fn search(termo: impl Into<String>, limite: Option<usize>) -> Self {
        Self {
            method: Some(RelayMethod::Search.as_str().to_string()),
            data: Some(RelayData {
                termo: Some(termo.into()),
                limite,
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("AUDIO_STREAM".parse::<RelayMethod>(), Ok(RelayMethod::AudioStream));
        assert_eq!("Search".parse::<RelayMethod>(), Ok(RelayMethod::Search));
        assert!("download".parse::<RelayMethod>().is_err());
        assert!(RelayMethod::VideoStream.is_stream());
        assert!(!RelayMethod::VideoInfo.is_audio());
    }

    #[test]
    fn test_request_shape() {
        let req = RelayRequest::for_url(RelayMethod::AudioStream, "https://m/1");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"method": "audio_stream", "data": {"url": "https://m/1"}})
        );

        let parsed: RelayRequest =
            serde_json::from_str(r#"{"method":"search","data":{"termo":"x","limite":"5"}}"#)
                .unwrap();
        assert_eq!(parsed, RelayRequest::search("x", Some(5)));

        let empty: RelayRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.method.is_none() && empty.data.is_none());
    }
}
