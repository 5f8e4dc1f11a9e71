//! Transport seam: one HTTP exchange against one origin

use crate::error::AttemptError;
use crate::request::ClientRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{StatusCode, header::HeaderMap};
use std::{io, time::Duration};
use url::Url;

/// Body of a response, read incrementally
pub type ByteStream = BoxStream<'static, Result<Bytes, io::Error>>;

/// Raw response of a single exchange; the status is not interpreted here
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with an in-memory body
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::new(
            status,
            HeaderMap::new(),
            futures::stream::once(async move { Ok(body) }).boxed(),
        )
    }
}

/// Sends a request to an origin
///
/// Errors are transport-level failures only; non-2xx statuses come back as
/// a normal [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        origin: &Url,
        request: &ClientRequest,
    ) -> Result<TransportResponse, AttemptError>;
}

/// `reqwest` backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Per-request timeout, applied to the whole exchange
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Appends `path` below the origin's own path, so `/v1` prefixes survive
fn join(origin: &Url, path: &str) -> Result<Url, AttemptError> {
    let mut base = origin.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| AttemptError::network(format!("invalid URL {}{}: {}", origin, path, e)))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        origin: &Url,
        request: &ClientRequest,
    ) -> Result<TransportResponse, AttemptError> {
        let url = join(origin, &request.path)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::network(format!("timeout: {}", e))
            } else {
                AttemptError::network(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::other(e.to_string()))
            .boxed();

        Ok(TransportResponse::new(status, headers, body))
    }
}
