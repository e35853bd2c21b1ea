mod common;

use std::time::Duration;

use common::{MockTransport, Step};
use proptest::prelude::*;
use resilient_client::{Client, RetryConfigBuilder};

fn run(body: Vec<u8>, failures_before_success: usize) -> (u16, usize, Vec<bytes::Bytes>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async move {
        let mut script: Vec<Step> = (0..failures_before_success).map(|_| Step::Response(503)).collect();
        script.push(Step::Response(200));
        let transport = MockTransport::new(script);

        let retry = RetryConfigBuilder::new()
            .max_attempts((failures_before_success + 1) as usize)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .retry_methods([http::Method::PUT].into_iter().collect())
            .build();

        let config = Client::builder()
            .retry_config(retry)
            .transport(transport.clone())
            .build();
        let client = Client::new(config);

        let response = client
            .put("https://example.com/".parse().unwrap(), body)
            .await
            .unwrap();

        (response.status, transport.call_count(), transport.bodies())
    })
}

proptest! {
    /// Every attempt declares and sends the exact same body, regardless of
    /// how many times the request is retried first.
    #[test]
    fn body_is_replayed_bit_identical_across_any_number_of_retries(
        body in proptest::collection::vec(any::<u8>(), 0..4096),
        failures in 0usize..5,
    ) {
        let (status, call_count, bodies) = run(body.clone(), failures);
        prop_assert_eq!(status, 200);
        prop_assert_eq!(call_count, failures + 1);
        prop_assert_eq!(bodies.len(), failures + 1);
        for sent in &bodies {
            prop_assert_eq!(sent.as_ref(), body.as_slice());
        }
    }
}
