//! Slot pool behaviour under concurrent callers

use crate::integration::mock_server::{init_tracing, limiter};
use async_trait::async_trait;
use futures::future::join_all;
use paced_http::{RateLimitedTransport, RequestContext, RequestParts, ResponseParts, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

struct Ping;

impl RequestParts for Ping {
    fn set_header(&mut self, _name: &str, _value: &str) -> paced_http::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct Done;

impl ResponseParts for Done {
    fn status(&self) -> u16 {
        200
    }

    fn header(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Base transport that takes 100ms per call and tracks peak concurrency.
#[derive(Default)]
struct SlowTransport {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Transport for SlowTransport {
    type Request = Ping;
    type Response = Done;

    async fn execute(&self, _request: Ping) -> paced_http::Result<Done> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Done)
    }
}

#[tokio::test(start_paused = true)]
async fn test_four_calls_run_in_two_waves_of_two() {
    init_tracing();
    let limiter = limiter(
        Duration::ZERO,
        2,
        Duration::from_secs(1),
        Duration::from_secs(30),
    );
    let transport = Arc::new(RateLimitedTransport::new(SlowTransport::default(), limiter.clone()));
    let ctx = RequestContext::new();

    let start = Instant::now();
    let results = join_all((0..4).map(|_| transport.execute(&ctx, Ping))).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(elapsed >= Duration::from_millis(200), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(300), "elapsed {:?}", elapsed);
    assert_eq!(transport.base().peak.load(Ordering::SeqCst), 2);

    let snap = limiter.snapshot();
    assert_eq!(snap.in_flight, 0);
    assert_eq!(snap.available_slots, 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_waiter_does_not_leak_slot() {
    let limiter = limiter(
        Duration::ZERO,
        1,
        Duration::from_secs(1),
        Duration::from_secs(30),
    );
    let transport = Arc::new(RateLimitedTransport::new(SlowTransport::default(), limiter.clone()));

    let holder = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.execute(&RequestContext::new(), Ping).await })
    };
    while limiter.snapshot().in_flight == 0 {
        tokio::task::yield_now().await;
    }

    let impatient = RequestContext::with_timeout(Duration::from_millis(30));
    let err = transport.execute(&impatient, Ping).await.unwrap_err();
    assert!(err.is_cancellation());

    assert!(holder.await.unwrap().is_ok());
    let snap = limiter.snapshot();
    assert_eq!(snap.in_flight, 0);
    assert_eq!(snap.available_slots, 1);
}
