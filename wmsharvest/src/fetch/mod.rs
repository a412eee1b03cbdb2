//! Tile fetching.
//!
//! - `http`: the HTTP seam (`AsyncHttpClient`) and its reqwest implementation
//! - `policy`: exponential backoff with jitter
//! - `worker`: one tile's fetch, retry and outcome classification
//!
//! # Retry behaviour
//!
//! ```text
//! 200 + body      -> Success
//! 429             -> backoff, retry      -> RateLimited when exhausted
//! timeout/connect -> backoff, retry      -> TransientFailure when exhausted
//! anything else   -> PermanentFailure (single attempt)
//! ```

mod http;
mod policy;
mod worker;

use std::time::Duration;

pub use http::{
    AsyncHttpClient, HttpResponse, ReqwestClient, TransportError, DEFAULT_TIMEOUT_SECS,
};
pub use policy::{
    BackoffPolicy, DEFAULT_BACKOFF_BASE_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_SECS,
};
pub use worker::{FetchOutcome, TileFetcher};

#[cfg(test)]
pub use http::tests::ScriptedHttpClient;

/// Network settings for tile fetching.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Per-request timeout
    timeout: Duration,
    /// Retry budget and backoff timing
    backoff: BackoffPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of attempts for retryable failures.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.backoff.max_attempts = max_attempts.max(1);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Builds the reqwest client for these settings.
    pub fn build_client(&self) -> Result<ReqwestClient, TransportError> {
        ReqwestClient::with_timeout(self.timeout)
    }
}
