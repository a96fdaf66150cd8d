//! Retry policy for requests to the rendering service.
//!
//! The defaults follow the usual retrying-HTTP-client behaviour: up to 4
//! retries, exponential backoff from 1s capped at 30s, and retries on
//! transport errors, `429 Too Many Requests` and 5xx responses other than
//! `501 Not Implemented`.

use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 4;
const DEFAULT_WAIT_MIN: Duration = Duration::from_secs(1);
const DEFAULT_WAIT_MAX: Duration = Duration::from_secs(30);

/// Decides whether a response status is worth another attempt.
pub type StatusPredicate = Arc<dyn Fn(StatusCode) -> bool + Send + Sync>;

/// How long to wait before a retry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// The same wait before every retry.
    Constant(Duration),
    /// `min * 2^attempt`, capped at `max`.
    Exponential { min: Duration, max: Duration },
}

impl Backoff {
    /// Wait before retry number `attempt` (0 for the first retry).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Constant(wait) => wait,
            Backoff::Exponential { min, max } => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                min.checked_mul(factor).map_or(max, |wait| wait.min(max))
            }
        }
    }

    /// Upper bound on any single wait.
    pub fn max_delay(&self) -> Duration {
        match *self {
            Backoff::Constant(wait) => wait,
            Backoff::Exponential { max, .. } => max,
        }
    }
}

/// Retry policy handed to [`MapRenderer`](crate::MapRenderer).
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retryable_status: StatusPredicate,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
            retryable_status: Arc::new(default_retryable_status),
        }
    }

    /// Replace the status predicate.
    pub fn with_retryable_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        self.retryable_status = Arc::new(predicate);
        self
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        (self.retryable_status)(status)
    }

    /// Transport errors other than malformed requests and redirect loops are
    /// treated as transient.
    pub fn should_retry_error(&self, error: &reqwest::Error) -> bool {
        !(error.is_builder() || error.is_redirect())
    }

    /// Wait before retry number `attempt`, honouring a server-provided
    /// `Retry-After` hint without exceeding the backoff's maximum.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.backoff.max_delay()),
            None => self.backoff.delay(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            Backoff::Exponential {
                min: DEFAULT_WAIT_MIN,
                max: DEFAULT_WAIT_MAX,
            },
        )
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Retry on 429 and on 5xx other than 501.
pub fn default_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            min: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(4), Duration::from_secs(16));
        assert_eq!(backoff.delay(5), Duration::from_secs(30));
        assert_eq!(backoff.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_constant_backoff() {
        let backoff = Backoff::Constant(Duration::from_millis(5));
        assert_eq!(backoff.delay(0), Duration::from_millis(5));
        assert_eq!(backoff.delay(9), Duration::from_millis(5));
    }

    #[test]
    fn test_default_retryable_status() {
        assert!(default_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(default_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(default_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!default_retryable_status(StatusCode::NOT_IMPLEMENTED));
        assert!(!default_retryable_status(StatusCode::NOT_FOUND));
        assert!(!default_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_custom_predicate() {
        let policy = RetryPolicy::default().with_retryable_status(|s| s == StatusCode::NOT_FOUND);
        assert!(policy.should_retry_status(StatusCode::NOT_FOUND));
        assert!(!policy.should_retry_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0, Some(Duration::from_secs(3))), Duration::from_secs(3));
        assert_eq!(policy.delay(0, Some(Duration::from_secs(600))), Duration::from_secs(30));
        assert_eq!(policy.delay(2, None), Duration::from_secs(4));
    }
}
