mod common;

use std::time::{Duration, Instant};

use common::{MockTransport, Step};
use resilient_client::{Client, RateLimiterConfigBuilder, RetryConfigBuilder};

#[tokio::test]
async fn serializes_requests_to_the_configured_rate() {
    let transport = MockTransport::new(vec![Step::Response(200), Step::Response(200), Step::Response(200)]);
    let config = Client::builder()
        .retry_config(RetryConfigBuilder::new().max_attempts(1).build())
        .rate_limiter(
            RateLimiterConfigBuilder::new()
                .requests_per_second(10.0)
                .burst_capacity(1)
                .build(),
        )
        .transport(transport.clone())
        .build();
    let client = Client::new(config);

    let start = Instant::now();
    for _ in 0..3 {
        client.get("https://example.com/".parse().unwrap()).await.unwrap();
    }

    // Burst of 1 at 10/s: the 2nd and 3rd calls each wait ~100ms.
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn rate_limit_timeout_surfaces_before_any_attempt() {
    let transport = MockTransport::new(vec![Step::Response(200)]);
    let config = Client::builder()
        .retry_config(RetryConfigBuilder::new().max_attempts(1).build())
        .rate_limiter(
            RateLimiterConfigBuilder::new()
                .requests_per_second(0.1)
                .burst_capacity(1)
                .build(),
        )
        .timeout(Duration::from_millis(20))
        .transport(transport.clone())
        .build();
    let client = Client::new(config);

    client.get("https://example.com/".parse().unwrap()).await.unwrap();
    let err = client.get("https://example.com/".parse().unwrap()).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(transport.call_count(), 1);
}
