//! Resilient HTTP client: retry with linear backoff and origin failover

use crate::error::{AttemptError, ClientError, Result};
use crate::origin::OriginSet;
use crate::request::ClientRequest;
use crate::retry::{RetryAttempt, RetryPolicy};
use crate::transport::{ByteStream, ReqwestTransport, Transport, TransportResponse};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{
    StatusCode,
    header::{HeaderMap, RETRY_AFTER},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::BTreeSet, fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use url::Url;

/// Default timeout to establish a connection to an origin
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("musica/", env!("CARGO_PKG_VERSION"));

/// Successful response of a logical request
pub struct ClientResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Origin that answered
    pub origin: Url,
    /// Every attempt made, the successful one last
    pub attempts: Vec<RetryAttempt>,
    body: ByteStream,
}

impl fmt::Debug for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientResponse")
            .field("status", &self.status)
            .field("origin", &self.origin.as_str())
            .field("attempts", &self.attempts.len())
            .finish_non_exhaustive()
    }
}

impl ClientResponse {
    /// Body as a byte stream, read incrementally
    pub fn into_stream(self) -> ByteStream {
        self.body
    }

    /// Whole body in memory
    pub async fn bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// HTTP client that keeps working across unreliable backend origins
///
/// A logical request gets `max_retries_per_origin × origins` attempts. A
/// transport failure or a non-2xx status moves to the next origin, waiting
/// `base_delay × k` after the k-th attempt. A 429 retries the same origin
/// after a flat wait and only rotates once that origin has been rate
/// limited `max_retries_per_origin` times in a row.
///
/// Clones share the same [`OriginSet`], so a failover made by one request is
/// seen by all the following ones.
///
/// # Example
///
/// ```no_run
/// use musclient::{ClientRequest, ResilientClient};
///
/// # async fn example() -> musclient::Result<()> {
/// let client = ResilientClient::builder()
///     .origins(["https://primary.example", "http://localhost:3000"])
///     .build()?;
///
/// let status: serde_json::Value = client.execute(&ClientRequest::get("/")).await?.json().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ResilientClient {
    origins: Arc<OriginSet>,
    policy: RetryPolicy,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("origins", &self.origins)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    pub fn new(origins: OriginSet, policy: RetryPolicy, transport: Arc<dyn Transport>) -> Self {
        Self {
            origins: Arc::new(origins),
            policy,
            transport,
        }
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn origins(&self) -> &OriginSet {
        &self.origins
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Executes `request` with the client's retry policy
    pub async fn execute(&self, request: &ClientRequest) -> Result<ClientResponse> {
        self.execute_with(request, &self.policy).await
    }

    /// Executes `request` with an explicit retry policy
    pub async fn execute_with(
        &self,
        request: &ClientRequest,
        policy: &RetryPolicy,
    ) -> Result<ClientResponse> {
        let budget = if request.idempotent {
            policy.budget(self.origins.len())
        } else {
            1
        };

        let mut index = self.origins.active_index();
        let mut attempts = Vec::new();
        let mut tried = BTreeSet::new();
        let mut rate_limited_in_a_row = 0;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let origin = self.origins.get(index).clone();
            tried.insert(index);
            debug!(origin = %origin, attempt, budget, path = %request.path, "Sending request");

            let error = match self.transport.send(&origin, request).await {
                Ok(response) if response.status.is_success() => {
                    self.origins.record_success(index);
                    attempts.push(RetryAttempt {
                        attempt_number: attempt,
                        origin: origin.clone(),
                        error: None,
                    });
                    if attempt > 1 {
                        info!(origin = %origin, attempt, "Request succeeded after retry");
                    }
                    return Ok(into_client_response(response, origin, attempts));
                }
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    AttemptError::RateLimited {
                        retry_after: parse_retry_after(&response.headers),
                    }
                }
                Ok(response) => AttemptError::Status {
                    status: response.status.as_u16(),
                },
                Err(e) => e,
            };

            warn!(origin = %origin, attempt, budget, error = %error, "Request attempt failed");
            attempts.push(RetryAttempt {
                attempt_number: attempt,
                origin,
                error: Some(error.clone()),
            });

            if attempt >= budget {
                return Err(ClientError::Exhausted {
                    attempts: attempts.len(),
                    origins_tried: tried.len(),
                    last: error,
                });
            }

            let delay = match &error {
                AttemptError::RateLimited { retry_after } => {
                    rate_limited_in_a_row += 1;
                    if rate_limited_in_a_row >= policy.max_retries_per_origin {
                        rate_limited_in_a_row = 0;
                        index = self.origins.advance_from(index);
                    }
                    policy.rate_limit_wait(*retry_after)
                }
                _ => {
                    rate_limited_in_a_row = 0;
                    index = self.origins.advance_from(index);
                    policy.backoff(attempt)
                }
            };

            tokio::time::sleep(delay).await;
        }
    }

    /// POSTs `body` as JSON and decodes the JSON answer
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ClientRequest::post_json(path, body)?;
        self.execute(&request).await?.json().await
    }

    /// GETs `path` and decodes the JSON answer
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(&ClientRequest::get(path)).await?.json().await
    }
}

fn into_client_response(
    response: TransportResponse,
    origin: Url,
    attempts: Vec<RetryAttempt>,
) -> ClientResponse {
    ClientResponse {
        status: response.status,
        headers: response.headers,
        origin,
        attempts,
        body: response.body,
    }
}

/// `Retry-After` in seconds; HTTP dates are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Builder for [`ResilientClient`]
pub struct ClientBuilder {
    origins: Vec<String>,
    policy: RetryPolicy,
    reset_to_primary_after: usize,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    user_agent: String,
    client: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            origins: Vec::new(),
            policy: RetryPolicy::default(),
            reset_to_primary_after: 0,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            client: None,
            transport: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Origin list, primary first
    pub fn origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origins = origins.into_iter().map(Into::into).collect();
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_retries_per_origin(mut self, retries: usize) -> Self {
        self.policy.max_retries_per_origin = retries.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    /// See [`OriginSet::with_reset_to_primary_after`]
    pub fn reset_to_primary_after(mut self, successes: usize) -> Self {
        self.reset_to_primary_after = successes;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout of a whole exchange, body included; leave unset for media streams
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a custom reqwest client
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Replace the HTTP transport (tests, alternative stacks)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ResilientClient> {
        let origins =
            OriginSet::parse(&self.origins)?.with_reset_to_primary_after(self.reset_to_primary_after);

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let client = match self.client {
                    Some(client) => client,
                    None => reqwest::Client::builder()
                        .user_agent(&self.user_agent)
                        .connect_timeout(self.connect_timeout)
                        .build()?,
                };
                let mut transport = ReqwestTransport::new(client);
                if let Some(timeout) = self.request_timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport) as Arc<dyn Transport>
            }
        };

        Ok(ResilientClient::new(origins, self.policy, transport))
    }
}
