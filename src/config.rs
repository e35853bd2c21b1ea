//! Top-level client configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::ratelimiter::RateLimiterConfig;
use crate::retry::RetryConfig;
use crate::transport::{ReqwestTransport, Transport};

/// Recognized configuration options for a [`crate::client::Client`].
pub struct ClientConfig {
    pub timeout: Option<Duration>,
    pub per_try_timeout: Option<Duration>,
    pub retry: RetryConfig,
    pub circuit_breaker: Option<Arc<CircuitBreaker>>,
    pub rate_limiter: Option<RateLimiterConfig>,
    pub tracing_enabled: bool,
    pub transport: Arc<dyn Transport>,
    pub name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            per_try_timeout: None,
            retry: RetryConfig::default(),
            circuit_breaker: None,
            rate_limiter: None,
            tracing_enabled: true,
            transport: Arc::new(ReqwestTransport::default()),
            name: "<unnamed>".to_string(),
        }
    }
}

/// Builder for [`ClientConfig`]: defaults documented in [`new`](Self::new),
/// chained setters, terminal [`build`](Self::build).
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    /// Creates a new builder with defaults:
    /// - no overall or per-try timeout
    /// - retry enabled, 3 max attempts, 100ms base delay, 20% jitter
    /// - circuit breaker disabled
    /// - rate limiter disabled
    /// - tracing enabled, metrics instruments always registered
    /// - transport: [`ReqwestTransport::default`]
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn timeout(mut self, d: Duration) -> Self {
        self.config.timeout = Some(d);
        self
    }

    pub fn per_try_timeout(mut self, d: Duration) -> Self {
        self.config.per_try_timeout = Some(d);
        self
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Enables the circuit breaker with the given config, constructing a
    /// fresh, exclusively-owned breaker instance.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = Some(Arc::new(CircuitBreaker::new(config)));
        self
    }

    /// Shares a caller-supplied breaker instance instead of constructing a
    /// new one, so multiple clients can observe and trip the same breaker.
    pub fn shared_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.config.circuit_breaker = Some(breaker);
        self
    }

    pub fn rate_limiter(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limiter = Some(config);
        self
    }

    pub fn tracing_enabled(mut self, yes: bool) -> Self {
        self.config.tracing_enabled = yes;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
