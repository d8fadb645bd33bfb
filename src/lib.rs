//! # paced-http
//!
//! Adaptive request pacing and concurrency control for clients of rate-limited HTTP APIs.
//!
//! ## Overview
//!
//! Every outbound call goes through a transport decorator that:
//!
//! 1. takes one of `max_concurrent_requests` slots,
//! 2. waits until `min_request_interval` has passed since the previous request started
//!    and any exponential backoff from recent `429` responses has elapsed,
//! 3. performs the call,
//! 4. feeds the response status back into the limiter,
//! 5. releases the slot, whatever the outcome.
//!
//! The limiter never retries on its own. Throttling shows up as added latency on later
//! calls, and as a [`RateLimitSignal`] for callers that inspect responses themselves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paced_http::resilience::{RateLimiter, RateLimiterConfig};
//! use paced_http::transport::{AuthenticatedRateLimitedTransport, BearerToken, HttpTransport};
//! use paced_http::RequestContext;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> paced_http::Result<()> {
//!     let limiter = Arc::new(RateLimiter::try_new(RateLimiterConfig::from_env()?)?);
//!     let http = HttpTransport::new("https://tracker.example.com/")?;
//!     let transport = AuthenticatedRateLimitedTransport::new(
//!         http.clone(),
//!         limiter.clone(),
//!         BearerToken::from_env("TRACKER_API_TOKEN")?,
//!     );
//!
//!     let ctx = RequestContext::with_timeout(Duration::from_secs(30));
//!     let response = transport.execute(&ctx, http.get("rest/api/2/myself")?).await?;
//!     println!("{} (backoff level {})", response.status(), limiter.snapshot().consecutive_failures);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | [`RateLimiter`](resilience::RateLimiter), config, throttling signal |
//! | [`transport`] | Boundary traits, `reqwest` transport, rate-limited decorators |
//! | [`context`] | [`RequestContext`] cancellation and deadlines |

pub mod context;
pub mod resilience;
pub mod transport;

pub use context::RequestContext;
pub use resilience::{Pacer, RateLimitSignal, RateLimiter, RateLimiterConfig, RateLimiterSnapshot};
pub use transport::{
    AuthenticatedRateLimitedTransport, BearerToken, HttpTransport, RateLimitedTransport,
    RequestParts, ResponseParts, Transport, TransportError,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
