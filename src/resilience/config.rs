use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Pacing, backoff and concurrency knobs for a [`RateLimiter`](super::RateLimiter).
///
/// Durations are (de)serialized as whole milliseconds:
///
/// ```yaml
/// min_request_interval_ms: 100
/// max_concurrent_requests: 5
/// backoff_base_ms: 1000
/// max_backoff_delay_ms: 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Minimum spacing between the starts of consecutive admitted requests.
    #[serde(rename = "min_request_interval_ms", with = "duration_ms")]
    pub min_request_interval: Duration,
    /// Upper bound on requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Delay imposed after the first throttling signal; doubles per consecutive signal.
    #[serde(rename = "backoff_base_ms", with = "duration_ms")]
    pub backoff_base: Duration,
    /// Ceiling on the computed backoff delay.
    #[serde(rename = "max_backoff_delay_ms", with = "duration_ms")]
    pub max_backoff_delay: Duration,
}

impl RateLimiterConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self {
            min_request_interval: Duration::from_millis(100),
            max_concurrent_requests: 5,
            backoff_base: Duration::from_secs(1),
            max_backoff_delay: Duration::from_secs(30),
        }
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_max_backoff_delay(mut self, max: Duration) -> Self {
        self.max_backoff_delay = max;
        self
    }

    /// Defaults overlaid with environment knobs:
    /// - `PACER_MIN_INTERVAL_MS`
    /// - `PACER_MAX_CONCURRENT`
    /// - `PACER_BACKOFF_BASE_MS`
    /// - `PACER_MAX_BACKOFF_MS`
    ///
    /// Unparseable values are ignored. The result is validated.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::new();
        if let Some(ms) = env_u64("PACER_MIN_INTERVAL_MS") {
            cfg.min_request_interval = Duration::from_millis(ms);
        }
        if let Some(n) = env::var("PACER_MAX_CONCURRENT")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            cfg.max_concurrent_requests = n;
        }
        if let Some(ms) = env_u64("PACER_BACKOFF_BASE_MS") {
            cfg.backoff_base = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("PACER_MAX_BACKOFF_MS") {
            cfg.max_backoff_delay = Duration::from_millis(ms);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                "invalid rate limiter configuration",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("rate_limiter_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(Error::configuration_with_context(
                "at least one concurrent request must be allowed",
                ErrorContext::new()
                    .with_field_path("max_concurrent_requests")
                    .with_source("rate_limiter_config"),
            ));
        }
        if self.max_concurrent_requests > Semaphore::MAX_PERMITS {
            return Err(Error::configuration_with_context(
                "too many concurrent requests for the slot pool",
                ErrorContext::new()
                    .with_field_path("max_concurrent_requests")
                    .with_details(format!(
                        "requested={}, limit={}",
                        self.max_concurrent_requests,
                        Semaphore::MAX_PERMITS
                    ))
                    .with_source("rate_limiter_config"),
            ));
        }
        if self.max_backoff_delay < self.backoff_base {
            return Err(Error::configuration_with_context(
                "max backoff delay must not be below the backoff base",
                ErrorContext::new()
                    .with_field_path("max_backoff_delay")
                    .with_details(format!(
                        "base={:?}, max={:?}",
                        self.backoff_base, self.max_backoff_delay
                    ))
                    .with_source("rate_limiter_config"),
            ));
        }
        Ok(())
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
