use std::time::Duration;

/// Status code a remote API uses to tell the client it is sending too fast.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Header carrying the server's advisory wait.
pub const RETRY_AFTER: &str = "retry-after";

/// Advisory value produced when the remote side throttles the client.
///
/// This is a signal, not necessarily a failure: the caller decides whether and when to
/// retry. `retry_after` is metadata for that decision and does not drive the limiter's
/// own backoff.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rate limited: HTTP {status}: {message} (retry after {retry_after:?})")]
pub struct RateLimitSignal {
    pub status: u16,
    pub retry_after: Duration,
    pub message: String,
}

impl RateLimitSignal {
    pub fn new(status: u16, retry_after: Duration, message: impl Into<String>) -> Self {
        Self {
            status,
            retry_after,
            message: message.into(),
        }
    }
}

/// Parse a `Retry-After` value given as a whole number of seconds.
///
/// The HTTP-date form is not supported and yields `None`, as do fractional or
/// negative values.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<u64>().ok().map(Duration::from_secs)
}
