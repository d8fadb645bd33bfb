use super::config::RateLimiterConfig;
use super::signal::{parse_retry_after, RateLimitSignal, RETRY_AFTER, TOO_MANY_REQUESTS};
use crate::context::RequestContext;
use crate::transport::ResponseParts;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// The capability set the transport decorators need from a limiter.
///
/// [`RateLimiter`] is the production implementation; tests substitute recording doubles.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Block until pacing and backoff allow the next request to start.
    async fn wait(&self, ctx: &RequestContext) -> Result<()>;

    /// Feed a completed response back into failure tracking.
    fn handle_response(&self, response: &dyn ResponseParts) -> std::result::Result<(), RateLimitSignal>;

    /// Block until a concurrency slot is free.
    async fn acquire_slot(&self, ctx: &RequestContext) -> Result<()>;

    /// Return a slot taken by [`acquire_slot`](Pacer::acquire_slot).
    fn release_slot(&self);
}

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub min_request_interval: Duration,
    pub consecutive_failures: u32,
    pub max_slots: usize,
    pub available_slots: usize,
    pub in_flight: usize,
    /// Delay a `wait` issued now would incur, ignoring callers already queued.
    pub estimated_wait: Duration,
}

#[derive(Debug, Default)]
struct State {
    last_request_start: Option<Instant>,
    consecutive_failures: u32,
}

/// Adaptive limiter shared by every request of a client session.
///
/// - Paces request starts at least `min_request_interval` apart
/// - Backs off exponentially while the remote keeps answering 429
/// - Bounds in-flight requests to `max_concurrent_requests`
///
/// Waiters queue on an admission lock so the pacing read and the update of
/// `last_request_start` happen as one step per caller. The failure counter sits behind
/// a separate short-lived lock, so feedback from finished requests is never held up by
/// a sleeping waiter.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    state: Mutex<State>,
    admission: tokio::sync::Mutex<()>,
    slots: Semaphore,
    in_flight: AtomicUsize,
}

impl RateLimiter {
    /// Build a limiter from an already-validated config.
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let max = cfg.max_concurrent_requests;
        Self {
            cfg,
            state: Mutex::new(State::default()),
            admission: tokio::sync::Mutex::new(()),
            slots: Semaphore::new(max),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn try_new(cfg: RateLimiterConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self::new(cfg))
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    // Every critical section leaves `State` consistent, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exponential backoff without jitter: zero for `n == 0`, otherwise
    /// `min(backoff_base * 2^(n-1), max_backoff_delay)`.
    pub fn calculate_backoff_delay(&self, consecutive_failures: u32) -> Duration {
        backoff_delay(
            self.cfg.backoff_base,
            self.cfg.max_backoff_delay,
            consecutive_failures,
        )
    }

    fn required_delay(&self, st: &State, now: Instant) -> Duration {
        let pacing = st
            .last_request_start
            .map(|last| {
                self.cfg
                    .min_request_interval
                    .saturating_sub(now.saturating_duration_since(last))
            })
            .unwrap_or(Duration::ZERO);
        pacing.max(self.calculate_backoff_delay(st.consecutive_failures))
    }

    /// Wait until the next request may start, then record it as started.
    ///
    /// If `ctx` fires first the error is returned and nothing is recorded.
    pub async fn wait(&self, ctx: &RequestContext) -> Result<()> {
        let _turn = ctx.run(self.admission.lock()).await?;

        let (delay, failures) = {
            let st = self.state();
            (self.required_delay(&st, Instant::now()), st.consecutive_failures)
        };

        if !delay.is_zero() {
            debug!(
                delay_ms = delay.as_millis() as u64,
                consecutive_failures = failures,
                "pacing outbound request"
            );
            ctx.run(tokio::time::sleep(delay)).await?;
        }

        self.state().last_request_start = Some(Instant::now());
        Ok(())
    }

    /// Absorb server feedback.
    ///
    /// A 429 bumps the failure counter and yields a [`RateLimitSignal`]. Its `retry_after`
    /// comes from the `Retry-After` header (whole seconds); without a usable header it is
    /// the backoff the limiter will now impose. Any other status clears the counter.
    pub fn handle_response(
        &self,
        response: &dyn ResponseParts,
    ) -> std::result::Result<(), RateLimitSignal> {
        let status = response.status();

        if status != TOO_MANY_REQUESTS {
            let previous = std::mem::take(&mut self.state().consecutive_failures);
            if previous > 0 {
                debug!(
                    status,
                    previous_failures = previous,
                    "remote recovered, backoff cleared"
                );
            }
            return Ok(());
        }

        let failures = {
            let mut st = self.state();
            st.consecutive_failures = st.consecutive_failures.saturating_add(1);
            st.consecutive_failures
        };
        let backoff = self.calculate_backoff_delay(failures);
        let retry_after = response
            .header(RETRY_AFTER)
            .and_then(parse_retry_after)
            .unwrap_or(backoff);

        debug!(
            status,
            consecutive_failures = failures,
            backoff_ms = backoff.as_millis() as u64,
            retry_after_ms = retry_after.as_millis() as u64,
            "remote throttled request"
        );

        Err(RateLimitSignal::new(
            status,
            retry_after,
            format!("rate limit exceeded ({} consecutive)", failures),
        ))
    }

    /// Take one concurrency slot, waiting for a release if none is free.
    pub async fn acquire_slot(&self, ctx: &RequestContext) -> Result<()> {
        let permit = ctx.run(self.slots.acquire()).await?.map_err(|_| {
            Error::runtime_with_context(
                "slot semaphore closed",
                ErrorContext::new().with_source("rate_limiter"),
            )
        })?;
        // The slot now lives on until release_slot.
        permit.forget();
        let in_flight = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(in_flight, "slot acquired");
        Ok(())
    }

    /// Return one slot. A release without a matching acquire is ignored.
    pub fn release_slot(&self) {
        let released = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if released {
            self.slots.add_permits(1);
            trace!(available = self.slots.available_permits(), "slot released");
        } else {
            warn!("release_slot called with no slot outstanding; ignoring");
        }
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let st = self.state();
        RateLimiterSnapshot {
            min_request_interval: self.cfg.min_request_interval,
            consecutive_failures: st.consecutive_failures,
            max_slots: self.cfg.max_concurrent_requests,
            available_slots: self.slots.available_permits(),
            in_flight: self.in_flight.load(Ordering::Acquire),
            estimated_wait: self.required_delay(&st, Instant::now()),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("cfg", &self.cfg)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Pacer for RateLimiter {
    async fn wait(&self, ctx: &RequestContext) -> Result<()> {
        RateLimiter::wait(self, ctx).await
    }

    fn handle_response(&self, response: &dyn ResponseParts) -> std::result::Result<(), RateLimitSignal> {
        RateLimiter::handle_response(self, response)
    }

    async fn acquire_slot(&self, ctx: &RequestContext) -> Result<()> {
        RateLimiter::acquire_slot(self, ctx).await
    }

    fn release_slot(&self) {
        RateLimiter::release_slot(self)
    }
}

/// Pure form of [`RateLimiter::calculate_backoff_delay`].
pub fn backoff_delay(base: Duration, max: Duration, consecutive_failures: u32) -> Duration {
    if consecutive_failures == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32
        .checked_shl(consecutive_failures - 1)
        .unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX).min(max)
}
