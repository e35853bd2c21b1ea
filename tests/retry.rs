mod common;

use std::time::Duration;

use common::{MockTransport, Step};
use resilient_client::{Client, RetryConfigBuilder};

fn client_with(transport: std::sync::Arc<MockTransport>, retry: resilient_client::RetryConfig) -> Client {
    let config = Client::builder()
        .retry_config(retry)
        .transport(transport)
        .name("retry-test")
        .build();
    Client::new(config)
}

#[tokio::test]
async fn retries_transient_error_then_succeeds() {
    let transport = MockTransport::new(vec![Step::Transient, Step::Response(200)]);
    let retry = RetryConfigBuilder::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
        .build();
    let client = client_with(transport.clone(), retry);

    let response = client.get("https://example.com/".parse().unwrap()).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 2);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn exhausts_attempts_and_returns_max_attempts_exceeded() {
    let transport = MockTransport::new(vec![
        Step::Response(503),
        Step::Response(503),
        Step::Response(503),
    ]);
    let retry = RetryConfigBuilder::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build();
    let client = client_with(transport.clone(), retry);

    let err = client.get("https://example.com/".parse().unwrap()).await.unwrap_err();
    assert!(err.is_max_attempts_exceeded());
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn non_retryable_status_returns_immediately() {
    let transport = MockTransport::new(vec![Step::Response(404)]);
    let retry = RetryConfigBuilder::new().max_attempts(5).build();
    let client = client_with(transport.clone(), retry);

    let response = client.get("https://example.com/".parse().unwrap()).await.unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn post_without_idempotency_key_is_not_retried() {
    let transport = MockTransport::new(vec![Step::Response(503)]);
    let retry = RetryConfigBuilder::new().max_attempts(3).build();
    let client = client_with(transport.clone(), retry);

    // A retryable status gated out by method rules is still a response, not
    // an error: the caller gets it back with attempts == 1.
    let response = client
        .post("https://example.com/".parse().unwrap(), "payload")
        .await
        .unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.attempts, 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn post_with_idempotency_key_is_retried() {
    let transport = MockTransport::new(vec![Step::Response(503), Step::Response(200)]);
    let retry = RetryConfigBuilder::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .build();
    let client = client_with(transport.clone(), retry);

    let response = client
        .request(http::Method::POST, "https://example.com/".parse().unwrap())
        .header("Idempotency-Key", "abc-123")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn retry_after_header_overrides_computed_delay() {
    let transport = MockTransport::new(vec![
        Step::ResponseWithHeader(503, "retry-after", "0"),
        Step::Response(200),
    ]);
    let retry = RetryConfigBuilder::new()
        .max_attempts(3)
        .base_delay(Duration::from_secs(10))
        .max_delay(Duration::from_secs(30))
        .build();
    let client = client_with(transport.clone(), retry);

    let start = std::time::Instant::now();
    let response = client.get("https://example.com/".parse().unwrap()).await.unwrap();
    assert_eq!(response.status, 200);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn request_body_is_replayed_identically_across_attempts() {
    let transport = MockTransport::new(vec![Step::Response(503), Step::Response(200)]);
    let retry = RetryConfigBuilder::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .retry_methods([http::Method::PUT].into_iter().collect())
        .build();
    let client = client_with(transport.clone(), retry);

    client
        .put("https://example.com/".parse().unwrap(), "same-bytes-every-time")
        .await
        .unwrap();

    let bodies = transport.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0].as_ref(), b"same-bytes-every-time");
}
