//! Retry policy: classifies an attempt's outcome as retryable or terminal.

use std::collections::HashSet;
use std::time::Duration;

use http::Method;

use crate::error::TimeoutKind;
use crate::events::EventListeners;
use crate::request::{AttemptOutcome, Classification, RequestDescriptor};

/// Methods considered "safe by spec" for retry purposes: safe/idempotent
/// methods that a server is expected to tolerate repeating.
pub fn default_retry_methods() -> HashSet<Method> {
    [
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::PUT,
        Method::DELETE,
    ]
    .into_iter()
    .collect()
}

pub fn default_retry_status_codes() -> HashSet<u16> {
    [408, 429, 500, 502, 503, 504].into_iter().collect()
}

/// Configuration for the retry policy.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    pub retry_methods: HashSet<Method>,
    pub retry_status_codes: HashSet<u16>,
    pub respect_retry_after: bool,
    pub retry_enabled: bool,
    pub name: String,
    pub(crate) events: EventListeners,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            retry_methods: default_retry_methods(),
            retry_status_codes: default_retry_status_codes(),
            respect_retry_after: true,
            retry_enabled: true,
            name: "<unnamed>".to_string(),
            events: EventListeners::new(),
        }
    }
}

/// Builder for [`RetryConfig`]: fluent setters plus a terminal `build()`.
#[derive(Clone, Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, n: usize) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn base_delay(mut self, d: Duration) -> Self {
        self.config.base_delay = d;
        self
    }

    pub fn max_delay(mut self, d: Duration) -> Self {
        self.config.max_delay = d;
        self
    }

    pub fn jitter(mut self, j: f64) -> Self {
        self.config.jitter = j;
        self
    }

    pub fn retry_methods(mut self, methods: HashSet<Method>) -> Self {
        self.config.retry_methods = methods;
        self
    }

    pub fn retry_status_codes(mut self, codes: HashSet<u16>) -> Self {
        self.config.retry_status_codes = codes;
        self
    }

    pub fn respect_retry_after(mut self, yes: bool) -> Self {
        self.config.respect_retry_after = yes;
        self
    }

    pub fn retry_enabled(mut self, yes: bool) -> Self {
        self.config.retry_enabled = yes;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    /// Registers a callback invoked just before each retry sleep, receiving
    /// the attempt number, the computed delay, and a short reason string
    /// (e.g. `"status:503"`, `"error:transient"`).
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration, &str) + Send + Sync + 'static,
    {
        self.config.events.on_retry(f);
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

/// Methods that are not idempotent by default but can be retried anyway if
/// the request carries a non-empty `Idempotency-Key`.
fn is_conditionally_idempotent(method: &Method) -> bool {
    matches!(method, &Method::POST) || method.as_str() == "PATCH"
}

/// Classifies an attempt outcome by working through timeout kind, transport
/// error class, response status, and finally method gating.
pub fn classify(
    outcome: &AttemptOutcome,
    request: &RequestDescriptor,
    config: &RetryConfig,
    attempts_remaining: bool,
) -> Classification {
    // Rule 1: master switch / hard cap.
    if config.max_attempts <= 1 || !config.retry_enabled || !attempts_remaining {
        return Classification::Terminal;
    }

    match outcome {
        // Rule 2: context/overall timeouts are always terminal.
        AttemptOutcome::Timeout(TimeoutKind::Overall | TimeoutKind::Context) => {
            Classification::Terminal
        }
        // A per-try timeout is a transient condition subject to method gating.
        AttemptOutcome::Timeout(TimeoutKind::PerTry | TimeoutKind::Connection) => {
            gate_by_method(request, config)
        }
        // Rule 3: transient network condition.
        AttemptOutcome::TransientError => gate_by_method(request, config),
        // Rule 4: status-based retry.
        AttemptOutcome::Response { status } => {
            if config.retry_status_codes.contains(status) {
                gate_by_method(request, config)
            } else {
                Classification::Terminal
            }
        }
        AttemptOutcome::TerminalError => Classification::Terminal,
    }
}

/// Rule 5: method gating.
fn gate_by_method(request: &RequestDescriptor, config: &RetryConfig) -> Classification {
    let method = &request.method;
    let retryable = config.retry_methods.contains(method)
        || (is_conditionally_idempotent(method) && request.idempotency_key().is_some());

    if retryable {
        Classification::Retryable
    } else {
        Classification::Terminal
    }
}

/// Parses a `Retry-After` header value (seconds or an HTTP-date) into a
/// duration, clamped to never go below zero or above `max_delay * 8`.
pub fn parse_retry_after(value: &str, max_delay: Duration) -> Option<Duration> {
    let guard = max_delay.saturating_mul(8);

    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(guard));
    }

    if let Ok(when) = httpdate::parse_http_date(value.trim()) {
        let now = std::time::SystemTime::now();
        let delta = when.duration_since(now).unwrap_or(Duration::ZERO);
        return Some(delta.min(guard));
    }

    None
}
