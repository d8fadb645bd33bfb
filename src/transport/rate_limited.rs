use super::Transport;
use crate::context::RequestContext;
use crate::resilience::Pacer;
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// Decorator that runs every request through a shared [`Pacer`].
///
/// Per call: take a slot, wait for pacing clearance, execute, report the response, and
/// release the slot. The release happens on every exit path, including when the returned
/// future is dropped mid-flight or the base transport panics.
pub struct RateLimitedTransport<T> {
    base: T,
    limiter: Arc<dyn Pacer>,
}

impl<T: Transport> RateLimitedTransport<T> {
    pub fn new(base: T, limiter: Arc<dyn Pacer>) -> Self {
        Self { base, limiter }
    }

    pub fn base(&self) -> &T {
        &self.base
    }

    pub fn limiter(&self) -> &Arc<dyn Pacer> {
        &self.limiter
    }

    /// Execute `request` under the limiter.
    ///
    /// The base transport's outcome is returned unchanged. A 429 comes back as an
    /// ordinary response; the throttling signal only updates the limiter.
    pub async fn execute(&self, ctx: &RequestContext, request: T::Request) -> Result<T::Response> {
        self.execute_with(ctx, request, |_| Ok(())).await
    }

    /// Same sequence as [`execute`](Self::execute), with `prepare` applied to the request
    /// after pacing clearance and before dispatch.
    pub(crate) async fn execute_with<F>(
        &self,
        ctx: &RequestContext,
        mut request: T::Request,
        prepare: F,
    ) -> Result<T::Response>
    where
        F: FnOnce(&mut T::Request) -> Result<()> + Send,
    {
        self.limiter.acquire_slot(ctx).await?;
        let _slot = SlotGuard {
            limiter: self.limiter.as_ref(),
        };

        self.limiter.wait(ctx).await?;
        prepare(&mut request)?;

        let outcome = self.base.execute(request).await;
        if let Ok(response) = &outcome {
            if let Err(signal) = self.limiter.handle_response(response) {
                debug!(
                    status = signal.status,
                    retry_after_ms = signal.retry_after.as_millis() as u64,
                    "throttling recorded; returning response to caller"
                );
            }
        }
        outcome
    }
}

impl<T: Clone> Clone for RateLimitedTransport<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RateLimitedTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedTransport")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

struct SlotGuard<'a> {
    limiter: &'a dyn Pacer,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.limiter.release_slot();
    }
}
