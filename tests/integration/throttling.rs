//! Server-side throttling feedback

use crate::integration::mock_server::{limiter, MockServerFixture};
use paced_http::{RateLimitedTransport, RequestContext, Transport};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_retry_after_is_advisory_and_backoff_drives_next_wait() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_throttled("/rest/api/2/search", 5).await;

    let limiter = limiter(
        Duration::from_millis(10),
        5,
        Duration::from_millis(300),
        Duration::from_secs(3),
    );
    let http = fixture.http();
    let ctx = RequestContext::with_timeout(Duration::from_secs(10));

    limiter.wait(&ctx).await.unwrap();
    let resp = http
        .execute(http.get("rest/api/2/search").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);

    let signal = limiter.handle_response(&resp).unwrap_err();
    assert_eq!(signal.status, 429);
    assert_eq!(signal.retry_after, Duration::from_secs(5));

    let start = Instant::now();
    limiter.wait(&ctx).await.unwrap();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(300), "waited {:?}", waited);
    assert!(waited < Duration::from_secs(5), "waited {:?}", waited);
}

#[tokio::test]
async fn test_throttled_response_is_returned_and_recorded() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_throttled("/rest/api/2/search", 1).await;

    let limiter = limiter(
        Duration::ZERO,
        2,
        Duration::from_millis(50),
        Duration::from_secs(1),
    );
    let http = fixture.http();
    let transport = RateLimitedTransport::new(http.clone(), limiter.clone());
    let ctx = RequestContext::with_timeout(Duration::from_secs(10));

    let resp = transport
        .execute(&ctx, http.get("rest/api/2/search").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "1");
    assert_eq!(limiter.snapshot().consecutive_failures, 1);

    let resp = transport
        .execute(&ctx, http.get("rest/api/2/search").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    assert_eq!(limiter.snapshot().consecutive_failures, 2);
    assert_eq!(limiter.snapshot().available_slots, 2);
}

#[tokio::test]
async fn test_recovery_clears_backoff() {
    let mut fixture = MockServerFixture::new().await;
    let _throttled = fixture.mock_throttled("/rest/api/2/search", 1).await;
    let _ok = fixture.mock_status("/rest/api/2/myself", 200, 1).await;

    let limiter = limiter(
        Duration::ZERO,
        2,
        Duration::from_millis(50),
        Duration::from_secs(1),
    );
    let http = fixture.http();
    let transport = RateLimitedTransport::new(http.clone(), limiter.clone());
    let ctx = RequestContext::with_timeout(Duration::from_secs(10));

    transport
        .execute(&ctx, http.get("rest/api/2/search").unwrap())
        .await
        .unwrap();
    assert_eq!(limiter.snapshot().consecutive_failures, 1);

    let resp = transport
        .execute(&ctx, http.get("rest/api/2/myself").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(limiter.snapshot().consecutive_failures, 0);
    assert_eq!(limiter.snapshot().estimated_wait, Duration::ZERO);
}
