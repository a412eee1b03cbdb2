//! Single-tile fetch with differentiated retry.

use std::fmt;

use tracing::{debug, warn};

use super::http::{AsyncHttpClient, HttpResponse, TransportError};
use super::policy::BackoffPolicy;
use crate::coord::TileCoord;
use crate::wms::{Credential, WmsConfig};

/// HTTP status signalling the server is throttling us.
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Result of fetching one tile.
#[derive(Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200 with a non-empty body.
    Success(Vec<u8>),
    /// Every attempt was used up and the last one was answered with HTTP 429.
    RateLimited { attempts: u32 },
    /// Every attempt was used up and the last one failed at the transport level.
    TransientFailure(String),
    /// The server rejected the request, or the response was unusable. Not retried.
    PermanentFailure(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Payload of a successful fetch.
    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            FetchOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

impl fmt::Debug for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(payload) => write!(f, "Success({} bytes)", payload.len()),
            FetchOutcome::RateLimited { attempts } => {
                write!(f, "RateLimited {{ attempts: {} }}", attempts)
            }
            FetchOutcome::TransientFailure(cause) => write!(f, "TransientFailure({})", cause),
            FetchOutcome::PermanentFailure(cause) => write!(f, "PermanentFailure({})", cause),
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(payload) => write!(f, "downloaded {} bytes", payload.len()),
            FetchOutcome::RateLimited { attempts } => {
                write!(f, "rate limited after {} attempts", attempts)
            }
            FetchOutcome::TransientFailure(cause) => write!(f, "transient failure: {}", cause),
            FetchOutcome::PermanentFailure(cause) => write!(f, "permanent failure: {}", cause),
        }
    }
}

/// Classification of one attempt.
enum Attempt {
    Done(FetchOutcome),
    Retry(RetryReason),
}

enum RetryReason {
    RateLimited,
    Transport(TransportError),
}

fn classify(result: Result<HttpResponse, TransportError>) -> Attempt {
    match result {
        Ok(response) if response.status == 200 => {
            if response.body.is_empty() {
                Attempt::Done(FetchOutcome::PermanentFailure(
                    "HTTP 200 with empty body".to_string(),
                ))
            } else {
                Attempt::Done(FetchOutcome::Success(response.body))
            }
        }
        Ok(response) if response.status == STATUS_TOO_MANY_REQUESTS => {
            Attempt::Retry(RetryReason::RateLimited)
        }
        Ok(response) => Attempt::Done(FetchOutcome::PermanentFailure(format!(
            "HTTP {}",
            response.status
        ))),
        Err(err) if err.is_retryable() => Attempt::Retry(RetryReason::Transport(err)),
        Err(err) => Attempt::Done(FetchOutcome::PermanentFailure(err.to_string())),
    }
}

/// Fetches tiles from a WMS endpoint.
///
/// The credential and retry budget are fixed at construction so the worker
/// can be shared across concurrent fetches.
pub struct TileFetcher<C: AsyncHttpClient> {
    client: C,
    wms: WmsConfig,
    credential: Credential,
    policy: BackoffPolicy,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    pub fn new(client: C, wms: WmsConfig, credential: Credential, policy: BackoffPolicy) -> Self {
        Self {
            client,
            wms,
            credential,
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn wms(&self) -> &WmsConfig {
        &self.wms
    }

    /// Fetches one tile.
    ///
    /// HTTP 429 and timeouts/connection failures are retried with backoff up
    /// to the policy's attempt budget. Any other non-200 status fails on the
    /// first attempt.
    ///
    /// # Arguments
    ///
    /// * `tile` - Tile to request, in XYZ coordinates
    ///
    /// # Returns
    ///
    /// The image bytes on success, otherwise the failure class. Every failure
    /// is folded into [`FetchOutcome`] rather than returned as an error.
    pub async fn fetch(&self, tile: TileCoord) -> FetchOutcome {
        let url = match self.wms.get_map_url(&tile, &self.credential) {
            Ok(url) => url,
            Err(e) => return FetchOutcome::PermanentFailure(e.to_string()),
        };

        let mut attempt: u32 = 0;
        loop {
            debug!(zoom = tile.zoom, x = tile.col, y = tile.row, attempt, "Fetching tile");

            let reason = match classify(self.client.get(url.as_str()).await) {
                Attempt::Done(outcome) => {
                    if let FetchOutcome::PermanentFailure(ref cause) = outcome {
                        warn!(
                            zoom = tile.zoom,
                            x = tile.col,
                            y = tile.row,
                            cause = %cause,
                            "Tile request rejected"
                        );
                    }
                    return outcome;
                }
                Attempt::Retry(reason) => reason,
            };

            if !self.policy.has_attempt_after(attempt) {
                let attempts = attempt + 1;
                warn!(
                    zoom = tile.zoom,
                    x = tile.col,
                    y = tile.row,
                    attempts,
                    "Giving up on tile"
                );
                return match reason {
                    RetryReason::RateLimited => FetchOutcome::RateLimited { attempts },
                    RetryReason::Transport(err) => FetchOutcome::TransientFailure(format!(
                        "{} after {} attempts",
                        self.credential.redact(&err.to_string()),
                        attempts
                    )),
                };
            }

            let delay = self.policy.next_delay(attempt);
            match &reason {
                RetryReason::RateLimited => warn!(
                    zoom = tile.zoom,
                    x = tile.col,
                    y = tile.row,
                    wait_secs = delay.as_secs_f64(),
                    "Rate limited, retry {}/{}",
                    attempt + 1,
                    self.policy.max_attempts
                ),
                RetryReason::Transport(err) => warn!(
                    zoom = tile.zoom,
                    x = tile.col,
                    y = tile.row,
                    wait_secs = delay.as_secs_f64(),
                    error = %self.credential.redact(&err.to_string()),
                    "Network error, retry {}/{}",
                    attempt + 1,
                    self.policy.max_attempts
                ),
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
