//! The six named request/retry/breaker instruments, plus trace span
//! lifecycle.
//!
//! Instruments are process-global, described once, and safe for concurrent
//! update because the `metrics` crate's recorders are.

use std::time::Duration;

#[cfg(feature = "metrics")]
pub fn describe() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        "http_client_requests_total",
        "Total user-level requests, labeled by method/host/status/retry/error"
    );
    describe_histogram!(
        "http_client_request_duration_seconds",
        "Wall-clock duration of a user-level request, pipeline entry to exit"
    );
    describe_counter!(
        "http_client_retries_total",
        "Total retry decisions, labeled by reason/method/host/attempt"
    );
    describe_gauge!(
        "http_client_inflight_requests",
        "Requests currently in flight, labeled by host"
    );
    describe_histogram!(
        "http_client_request_size_bytes",
        "Request body buffer length, labeled by method/host"
    );
    describe_histogram!(
        "http_client_response_size_bytes",
        "Response body length, labeled by method/host/status"
    );
}

#[cfg(not(feature = "metrics"))]
pub fn describe() {}

pub struct RequestLabels<'a> {
    pub method: &'a str,
    pub host: &'a str,
}

pub fn record_inflight_start(_labels: &RequestLabels<'_>) {
    #[cfg(feature = "metrics")]
    metrics::gauge!("http_client_inflight_requests", "host" => _labels.host.to_string()).increment(1.0);
}

pub fn record_inflight_end(_labels: &RequestLabels<'_>) {
    #[cfg(feature = "metrics")]
    metrics::gauge!("http_client_inflight_requests", "host" => _labels.host.to_string()).decrement(1.0);
}

pub fn record_request_size(_labels: &RequestLabels<'_>, _bytes: u64) {
    #[cfg(feature = "metrics")]
    metrics::histogram!("http_client_request_size_bytes", "method" => _labels.method.to_string(), "host" => _labels.host.to_string()).record(_bytes as f64);
}

pub fn record_response_size(_labels: &RequestLabels<'_>, _status: u16, _bytes: u64) {
    #[cfg(feature = "metrics")]
    metrics::histogram!(
        "http_client_response_size_bytes",
        "method" => _labels.method.to_string(),
        "host" => _labels.host.to_string(),
        "status" => _status.to_string()
    )
    .record(_bytes as f64);
}

pub fn record_retry(_labels: &RequestLabels<'_>, _reason: &str, _attempt: u32) {
    #[cfg(feature = "metrics")]
    metrics::counter!(
        "http_client_retries_total",
        "reason" => _reason.to_string(),
        "method" => _labels.method.to_string(),
        "host" => _labels.host.to_string(),
        "attempt" => _attempt.to_string()
    )
    .increment(1);
}

pub fn record_request_complete(
    _labels: &RequestLabels<'_>,
    _status: Option<u16>,
    _retried: bool,
    _errored: bool,
    _duration: Duration,
) {
    #[cfg(feature = "metrics")]
    {
        let status_label = _status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string());
        metrics::counter!(
            "http_client_requests_total",
            "method" => _labels.method.to_string(),
            "host" => _labels.host.to_string(),
            "status" => status_label.clone(),
            "retry" => _retried.to_string(),
            "error" => _errored.to_string()
        )
        .increment(1);

        metrics::histogram!(
            "http_client_request_duration_seconds",
            "method" => _labels.method.to_string(),
            "host" => _labels.host.to_string(),
            "status" => status_label
        )
        .record(_duration.as_secs_f64());
    }
}

/// Opens the root trace span for a user-level request. A no-op handle when
/// the `tracing` feature is disabled.
#[cfg(feature = "tracing")]
pub fn root_span(method: &str, host: &str, path: &str) -> tracing::Span {
    tracing::info_span!("http_request", method = %method, host = %host, path = %path)
}

#[cfg(not(feature = "tracing"))]
pub fn root_span(_method: &str, _host: &str, _path: &str) {}

#[cfg(feature = "tracing")]
pub fn attempt_span(attempt: u32) -> tracing::Span {
    tracing::debug_span!("attempt", attempt)
}

#[cfg(not(feature = "tracing"))]
pub fn attempt_span(_attempt: u32) {}
