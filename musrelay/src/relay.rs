//! Byte-range aware relay of upstream media

use crate::credentials::CredentialProvider;
use crate::error::{RelayError, Result};
use crate::range::{ByteRange, RangeRequest};
use crate::resolver::{MediaKind, MediaResolver, ResolvedMedia};
use axum::{
    body::Body,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use reqwest::{
    StatusCode,
    header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue, RANGE},
};
use std::{io, sync::Arc};
use tracing::{debug, info, warn};
use url::Url;

/// Relayed body, read incrementally from the upstream
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, io::Error>>;

/// Status, headers and body of a relay answer
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from_stream(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Checks that a locator is an absolute http(s) URL
pub fn validate_locator(locator: Option<&str>) -> Result<Url> {
    let locator = locator
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| RelayError::validation("URL not provided", "A media URL is required"))?;

    let url = Url::parse(locator)
        .map_err(|e| RelayError::validation("Invalid URL", format!("{}: {}", locator, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::validation(
            "Invalid URL",
            format!("unsupported scheme {}", other),
        )),
    }
}

/// Keeps `take` bytes of `stream` after skipping `skip` bytes
///
/// Used when the upstream ignores the `Range` header and sends the whole
/// resource. Ending before `take` bytes is reported as `UnexpectedEof`.
pub fn byte_window(stream: ByteStream, skip: u64, take: u64) -> ByteStream {
    futures::stream::unfold(
        (stream, skip, take),
        |(mut stream, mut skip, remaining)| async move {
            if remaining == 0 {
                return None;
            }
            loop {
                match stream.next().await {
                    None => {
                        let err = io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("upstream ended {} bytes early", remaining),
                        );
                        return Some((Err(err), (stream, 0, 0)));
                    }
                    Some(Err(e)) => return Some((Err(e), (stream, 0, 0))),
                    Some(Ok(mut chunk)) => {
                        let len = chunk.len() as u64;
                        if len <= skip {
                            skip -= len;
                            continue;
                        }
                        if skip > 0 {
                            chunk = chunk.slice(skip as usize..);
                            skip = 0;
                        }
                        if chunk.len() as u64 > remaining {
                            chunk.truncate(remaining as usize);
                        }
                        let remaining = remaining - chunk.len() as u64;
                        return Some((Ok(chunk), (stream, 0, remaining)));
                    }
                }
            }
        },
    )
    .boxed()
}

/// Logs the end of a relayed body: completion, upstream drop or client disconnect
fn monitored(stream: ByteStream, locator: Url) -> ByteStream {
    struct Guard {
        locator: Url,
        sent: u64,
        finished: bool,
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            if !self.finished {
                info!(locator = %self.locator, sent = self.sent, "Client went away, upstream closed");
            }
        }
    }

    let guard = Guard {
        locator,
        sent: 0,
        finished: false,
    };

    futures::stream::unfold((stream, guard), |(mut stream, mut guard)| async move {
        if guard.finished {
            return None;
        }
        match stream.next().await {
            Some(Ok(chunk)) => {
                guard.sent += chunk.len() as u64;
                Some((Ok(chunk), (stream, guard)))
            }
            Some(Err(e)) => {
                warn!(locator = %guard.locator, sent = guard.sent, "Upstream stream failed: {}", e);
                guard.finished = true;
                Some((Err(e), (stream, guard)))
            }
            None => {
                debug!(locator = %guard.locator, sent = guard.sent, "Relay finished");
                guard.finished = true;
                None
            }
        }
    })
    .boxed()
}

fn header(value: impl ToString) -> Result<HeaderValue> {
    HeaderValue::from_str(&value.to_string())
        .map_err(|e| RelayError::other(format!("invalid header value: {}", e)))
}

/// Re-serves upstream media to a client, honouring byte ranges
///
/// Each call opens one upstream connection and pipes it chunk by chunk to
/// the caller; nothing is buffered beyond the chunk in flight. The relay
/// never retries: failures surface as an error response and the caller's
/// client decides.
#[derive(Clone)]
pub struct StreamRelay {
    client: reqwest::Client,
    resolver: Arc<dyn MediaResolver>,
    credentials: Arc<dyn CredentialProvider>,
}

impl StreamRelay {
    pub fn new(
        client: reqwest::Client,
        resolver: Arc<dyn MediaResolver>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            resolver,
            credentials,
        }
    }

    /// Resolves `locator` without streaming it
    pub async fn resolve(&self, locator: Option<&str>, kind: MediaKind) -> Result<ResolvedMedia> {
        let url = validate_locator(locator)?;
        self.resolver.resolve(&url, kind).await
    }

    /// Relays the resource behind `locator`
    ///
    /// - no usable range: `200` with the whole body
    /// - range: `206` with `Content-Range`, `Accept-Ranges` and `Content-Length`
    ///
    /// A range header is ignored when the total length is unknown.
    pub async fn relay(
        &self,
        locator: Option<&str>,
        kind: MediaKind,
        range_header: Option<&str>,
    ) -> Result<RelayResponse> {
        let media = self.resolve(locator, kind).await?;

        let range = match (range_header.and_then(RangeRequest::parse), media.total_length) {
            (Some(request), Some(total)) => Some(request.resolve(total)?),
            (Some(_), None) => {
                debug!(locator = %media.url, "Unknown length, ignoring Range header");
                None
            }
            _ => None,
        };

        match range {
            Some(range) => self.relay_range(&media, range).await,
            None => self.relay_full(&media).await,
        }
    }

    async fn open_upstream(
        &self,
        media: &ResolvedMedia,
        range: Option<&ByteRange>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .get(media.url.clone())
            .headers(self.credentials.headers(&media.url).await?);
        if let Some(range) = range {
            request = request.header(RANGE, range.to_request_header());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::upstream(format!("cannot reach {}: {}", media.url, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(RelayError::not_found(
                "Media not found",
                format!("{} answered {}", media.url, status),
            ));
        }
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            if let Some(range) = range {
                return Err(RelayError::RangeNotSatisfiable { total: range.total });
            }
        }
        if !status.is_success() {
            return Err(RelayError::upstream(format!(
                "{} answered {}",
                media.url, status
            )));
        }
        Ok(response)
    }

    fn body_of(response: reqwest::Response) -> ByteStream {
        response
            .bytes_stream()
            .map_err(|e| io::Error::other(e.to_string()))
            .boxed()
    }

    async fn relay_full(&self, media: &ResolvedMedia) -> Result<RelayResponse> {
        let upstream = self.open_upstream(media, None).await?;
        let length = media.total_length.or(upstream.content_length());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(media.kind.content_type()));
        if let Some(length) = length {
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
            headers.insert(CONTENT_LENGTH, header(length)?);
        }

        info!(locator = %media.url, ?length, "Relaying full resource");
        let body = monitored(Self::body_of(upstream), media.url.clone());

        Ok(RelayResponse {
            status: StatusCode::OK,
            headers,
            body,
        })
    }

    async fn relay_range(&self, media: &ResolvedMedia, range: ByteRange) -> Result<RelayResponse> {
        let upstream = self.open_upstream(media, Some(&range)).await?;
        let honoured = upstream.status() == StatusCode::PARTIAL_CONTENT;

        let body = if honoured {
            byte_window(Self::body_of(upstream), 0, range.len())
        } else {
            debug!(locator = %media.url, "Upstream ignored Range, skipping {} bytes", range.start);
            byte_window(Self::body_of(upstream), range.start, range.len())
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(media.kind.content_type()));
        headers.insert(CONTENT_RANGE, header(range.content_range())?);
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(CONTENT_LENGTH, header(range.len())?);

        info!(locator = %media.url, range = %range, "Relaying partial content");

        Ok(RelayResponse {
            status: StatusCode::PARTIAL_CONTENT,
            headers,
            body: monitored(body, media.url.clone()),
        })
    }
}
