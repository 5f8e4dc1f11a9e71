//! Upstream credentials (user agent, cookies, referer…)

use crate::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

/// Supplies the headers sent with every upstream request
///
/// Kept apart from the relay so that cookie or token refresh can evolve
/// without touching the byte piping.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn headers(&self, locator: &Url) -> Result<HeaderMap>;
}

/// Fixed set of headers, usually read from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    headers: HeaderMap,
}

impl StaticCredentials {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Builds the header map from name/value pairs, plus an optional User-Agent
    pub fn from_pairs<I, K, V>(user_agent: Option<&str>, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = HeaderMap::new();
        if let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) {
            headers.insert(USER_AGENT, header_value(ua)?);
        }
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_ref().as_bytes()).map_err(|e| {
                RelayError::other(format!("invalid header name {}: {}", name.as_ref(), e))
            })?;
            headers.insert(name, header_value(value.as_ref())?);
        }
        Ok(Self { headers })
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| RelayError::other(format!("invalid header value {:?}: {}", value, e)))
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn headers(&self, _locator: &Url) -> Result<HeaderMap> {
        Ok(self.headers.clone())
    }
}
