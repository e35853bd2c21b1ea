mod common;

use std::time::Duration;

use common::{MockTransport, Step};
use resilient_client::{CircuitBreakerConfigBuilder, Client, CircuitState, RetryConfigBuilder};

#[tokio::test]
async fn opens_after_consecutive_failures_and_rejects_admission() {
    let transport = MockTransport::new(vec![Step::Response(500), Step::Response(500)]);
    let retry = RetryConfigBuilder::new().max_attempts(1).build();
    let breaker = CircuitBreakerConfigBuilder::new()
        .failure_threshold(2)
        .success_threshold(1)
        .timeout(Duration::from_secs(60))
        .name("payments")
        .build();

    let config = Client::builder()
        .retry_config(retry)
        .circuit_breaker(breaker)
        .transport(transport.clone())
        .build();
    let client = Client::new(config);

    let _ = client.get("https://example.com/a".parse().unwrap()).await;
    let _ = client.get("https://example.com/b".parse().unwrap()).await;
    assert_eq!(client.circuit_breaker().unwrap().state(), CircuitState::Open);

    // A third request never reaches the transport: the breaker rejects it.
    let err = client.get("https://example.com/c".parse().unwrap()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn half_open_probe_closes_circuit_on_success() {
    let transport = MockTransport::new(vec![Step::Response(500), Step::Response(200)]);
    let retry = RetryConfigBuilder::new().max_attempts(1).build();
    let breaker = CircuitBreakerConfigBuilder::new()
        .failure_threshold(1)
        .success_threshold(1)
        .timeout(Duration::from_millis(20))
        .build();

    let config = Client::builder()
        .retry_config(retry)
        .circuit_breaker(breaker)
        .transport(transport.clone())
        .build();
    let client = Client::new(config);

    let _ = client.get("https://example.com/".parse().unwrap()).await;
    assert_eq!(client.circuit_breaker().unwrap().state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let response = client.get("https://example.com/".parse().unwrap()).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(client.circuit_breaker().unwrap().state(), CircuitState::Closed);
}

#[tokio::test]
async fn shared_breaker_is_observed_across_two_clients() {
    let breaker = std::sync::Arc::new(resilient_client::CircuitBreaker::new(
        CircuitBreakerConfigBuilder::new().failure_threshold(1).build(),
    ));

    let transport_a = MockTransport::new(vec![Step::Response(500)]);
    let config_a = Client::builder()
        .retry_config(RetryConfigBuilder::new().max_attempts(1).build())
        .shared_circuit_breaker(breaker.clone())
        .transport(transport_a)
        .build();
    let client_a = Client::new(config_a);

    let transport_b = MockTransport::new(vec![]);
    let config_b = Client::builder()
        .retry_config(RetryConfigBuilder::new().max_attempts(1).build())
        .shared_circuit_breaker(breaker.clone())
        .transport(transport_b.clone())
        .build();
    let client_b = Client::new(config_b);

    let _ = client_a.get("https://example.com/".parse().unwrap()).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let err = client_b.get("https://example.com/".parse().unwrap()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(transport_b.call_count(), 0);
}
