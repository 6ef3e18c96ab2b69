use rand::Rng;
use std::time::Duration;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/stall).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, short body, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// Wrong status or Content-Range for a range request.
    Protocol,
    /// Cooperative cancellation; never retried.
    Cancelled,
    /// Any other error (not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with a cap and a small random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (so at most `max_retries + 1` attempts).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay (jitter comes on top).
    pub max_delay: Duration,
    /// Treat protocol violations as retryable.
    pub retry_protocol_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            retry_protocol_errors: false,
        }
    }
}

/// Jitter never exceeds a tenth of the delay, nor half a second.
const MAX_JITTER: Duration = Duration::from_millis(500);

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based): `min(base * 2^retry, max_delay)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = 1u32 << retry.min(20);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }

    /// Largest jitter that may be added to `delay`.
    pub fn jitter_bound(delay: Duration) -> Duration {
        (delay / 10).min(MAX_JITTER)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Throttled
            | ErrorKind::Http5xx(_) => true,
            ErrorKind::Protocol => self.retry_protocol_errors,
            ErrorKind::Cancelled | ErrorKind::Other => false,
        }
    }

    /// Decide whether to retry after a failure, given how many retries were already made.
    pub fn decide(&self, retries_done: u32, kind: ErrorKind) -> RetryDecision {
        if retries_done >= self.max_retries || !self.is_retryable(kind) {
            return RetryDecision::NoRetry;
        }
        let delay = self.backoff(retries_done);
        let bound = Self::jitter_bound(delay).as_micros() as u64;
        let jitter = if bound == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=bound)
        };
        RetryDecision::RetryAfter(delay + Duration::from_micros(jitter))
    }
}
