//! Bearer-token injection through the authenticated decorator

use crate::integration::mock_server::{limiter, MockServerFixture};
use paced_http::{AuthenticatedRateLimitedTransport, BearerToken, RequestContext};
use std::time::Duration;

#[tokio::test]
async fn test_bearer_token_reaches_server() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/rest/api/2/myself")
        .match_header("authorization", "Bearer s3cret")
        .expect(2)
        .with_status(200)
        .with_body(r#"{"name":"bot"}"#)
        .create_async()
        .await;

    let limiter = limiter(
        Duration::from_millis(20),
        2,
        Duration::from_millis(100),
        Duration::from_secs(1),
    );
    let http = fixture.http();
    let transport = AuthenticatedRateLimitedTransport::new(
        http.clone(),
        limiter.clone(),
        BearerToken::new("s3cret"),
    );
    let ctx = RequestContext::with_timeout(Duration::from_secs(10));

    for _ in 0..2 {
        let resp = transport
            .execute(&ctx, http.get("rest/api/2/myself").unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    mock.assert_async().await;
    assert_eq!(limiter.snapshot().in_flight, 0);
}

#[tokio::test]
async fn test_deadline_during_backoff_sends_no_credentials() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture.mock_status("/rest/api/2/myself", 200, 0).await;

    let limiter = limiter(
        Duration::ZERO,
        1,
        Duration::from_secs(10),
        Duration::from_secs(10),
    );
    let throttled = fixture.mock_throttled("/rest/api/2/search", 30).await;
    let http = fixture.http();
    let transport = AuthenticatedRateLimitedTransport::new(
        http.clone(),
        limiter.clone(),
        BearerToken::new("s3cret"),
    );

    // first call trips a 10s backoff
    let resp = transport
        .execute(
            &RequestContext::with_timeout(Duration::from_secs(5)),
            http.get("rest/api/2/search").unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
    throttled.assert_async().await;

    let err = transport
        .execute(
            &RequestContext::with_timeout(Duration::from_millis(50)),
            http.get("rest/api/2/myself").unwrap(),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert_eq!(limiter.snapshot().available_slots, 1);
    mock.assert_async().await;
}
