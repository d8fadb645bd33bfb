//! Request pacing, backoff and concurrency control.
//!
//! # Resilience Primitives Module
//!
//! Everything that decides *when* an outbound request may start lives here. The
//! transports in [`crate::transport`] only sequence these calls around the real
//! network round-trip.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Pacing + exponential backoff + slot pool, and the [`Pacer`] trait |
//! | [`config`] | [`RateLimiterConfig`] with builder, env and YAML loading |
//! | [`signal`] | [`RateLimitSignal`] and `Retry-After` parsing |
//!
//! ## Backoff
//!
//! Each 429 increments a consecutive-failure counter `n`; any other status resets it.
//! While `n > 0` every `wait` is delayed by at least
//! `min(backoff_base * 2^(n-1), max_backoff_delay)`.
//!
//! ```rust
//! use paced_http::resilience::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(
//!     RateLimiterConfig::new()
//!         .with_backoff_base(Duration::from_secs(1))
//!         .with_max_backoff_delay(Duration::from_secs(30)),
//! );
//! assert_eq!(limiter.calculate_backoff_delay(0), Duration::ZERO);
//! assert_eq!(limiter.calculate_backoff_delay(3), Duration::from_secs(4));
//! assert_eq!(limiter.calculate_backoff_delay(10), Duration::from_secs(30));
//! ```

pub mod config;
pub mod rate_limiter;
pub mod signal;

pub use config::RateLimiterConfig;
pub use rate_limiter::{backoff_delay, Pacer, RateLimiter, RateLimiterSnapshot};
pub use signal::{parse_retry_after, RateLimitSignal, RETRY_AFTER, TOO_MANY_REQUESTS};
