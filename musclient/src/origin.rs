//! Ordered set of backend origins with a shared, circular active pointer

use crate::error::{ClientError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Candidate base addresses of the backend
///
/// The first entry is the primary origin. `active_index` is shared by every
/// request made through the same client: after a failover, later requests
/// start from the origin that worked.
#[derive(Debug)]
pub struct OriginSet {
    origins: Vec<Url>,
    active: AtomicUsize,
    success_streak: AtomicUsize,
    reset_to_primary_after: usize,
}

impl OriginSet {
    pub fn new(origins: Vec<Url>) -> Result<Self> {
        if origins.is_empty() {
            return Err(ClientError::NoOrigins);
        }
        Ok(Self {
            origins,
            active: AtomicUsize::new(0),
            success_streak: AtomicUsize::new(0),
            reset_to_primary_after: 0,
        })
    }

    /// Parses base URLs such as `http://localhost:3000`
    pub fn parse<I, S>(origins: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = origins
            .into_iter()
            .map(|s| {
                let s = s.as_ref();
                Url::parse(s).map_err(|e| ClientError::InvalidOrigin {
                    origin: s.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(urls)
    }

    /// Return to the primary origin after `n` consecutive successes on a
    /// fallback origin. `0` keeps failover sticky.
    pub fn with_reset_to_primary_after(mut self, n: usize) -> Self {
        self.reset_to_primary_after = n;
        self
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn origins(&self) -> &[Url] {
        &self.origins
    }

    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire) % self.origins.len()
    }

    pub fn active(&self) -> &Url {
        &self.origins[self.active_index()]
    }

    /// Origin at `index`, modulo the number of origins
    pub fn get(&self, index: usize) -> &Url {
        &self.origins[index % self.origins.len()]
    }

    /// Moves the active pointer past `observed` after a failure on it
    ///
    /// When another request already moved the pointer away from `observed`,
    /// its choice is kept. Returns the index to use for the next attempt.
    pub fn advance_from(&self, observed: usize) -> usize {
        let n = self.origins.len();
        let observed = observed % n;
        let next = (observed + 1) % n;
        self.success_streak.store(0, Ordering::Release);
        match self
            .active
            .compare_exchange(observed, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            Err(current) if current % n != observed => current % n,
            // pointer moved but wrapped onto the same slot: still rotate locally
            Err(_) => next,
        }
    }

    /// Records a success on `index`, returning to the primary when the policy says so
    pub fn record_success(&self, index: usize) {
        if self.reset_to_primary_after == 0 || index % self.origins.len() == 0 {
            self.success_streak.store(0, Ordering::Release);
            return;
        }
        let streak = self.success_streak.fetch_add(1, Ordering::AcqRel) + 1;
        if streak >= self.reset_to_primary_after {
            self.success_streak.store(0, Ordering::Release);
            self.active.store(0, Ordering::Release);
            tracing::info!(primary = %self.origins[0], "Returning to primary origin");
        }
    }
}
