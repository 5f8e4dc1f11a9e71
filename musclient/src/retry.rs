//! Retry budget and backoff

use crate::error::AttemptError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_RETRIES_PER_ORIGIN: usize = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on a server supplied `Retry-After`
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// How many attempts a logical request gets and how long to wait between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries_per_origin: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries_per_origin: DEFAULT_MAX_RETRIES_PER_ORIGIN,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries_per_origin: usize, base_delay: Duration) -> Self {
        Self {
            max_retries_per_origin: max_retries_per_origin.max(1),
            base_delay,
        }
    }

    /// Total attempts allowed: `max_retries_per_origin × origin_count`
    pub fn budget(&self, origin_count: usize) -> usize {
        self.max_retries_per_origin.max(1) * origin_count.max(1)
    }

    /// Linear backoff after the `failed_attempt`-th attempt (1-based)
    pub fn backoff(&self, failed_attempt: usize) -> Duration {
        self.base_delay * failed_attempt as u32
    }

    /// Flat wait before retrying a rate limited origin
    pub fn rate_limit_wait(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.base_delay).min(MAX_RATE_LIMIT_WAIT)
    }
}

/// One attempt of a logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt_number: usize,
    pub origin: Url,
    pub error: Option<AttemptError>,
}
