//! Category-wide retry policy for pipeline operations.
//!
//! Download failures may be transient and are retried a bounded number of
//! times. Repository and integrity failures describe facts about the data
//! itself and abort immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};
use tuf::{DownloadError, Error};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the operation again after a delay.
    Retry,
    /// Return the error to the caller.
    Abort,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every later one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and base backoff.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Decides whether `attempt` (1-based) should be followed by another one.
    pub fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if attempt >= self.max_attempts {
            return Decision::Abort;
        }
        match err {
            Error::Download(DownloadError::FetcherHttp { status_code, .. })
                if !is_retryable_status(*status_code) =>
            {
                Decision::Abort
            }
            Error::Download(_) => Decision::Retry,
            Error::Repository(_) | Error::LengthOrHashMismatch(_) => Decision::Abort,
        }
    }

    /// Returns the delay to wait after the failed `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }

    /// Runs `op` until it succeeds or [`RetryPolicy::decide`] aborts.
    ///
    /// The error of the last attempt is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match self.decide(&err, attempt) {
                Decision::Abort => {
                    debug!(attempt, kind = %err.kind(), "giving up");
                    return Err(err);
                }
                Decision::Retry => {
                    let delay = self.delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        kind = %err.kind(),
                        error = %err,
                        delay = ?delay,
                        "retrying after download failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Server errors, request timeouts and rate limiting may succeed later;
/// other client errors will not.
fn is_retryable_status(status_code: u16) -> bool {
    status_code >= 500 || status_code == 408 || status_code == 429
}
