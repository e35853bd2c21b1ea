//! The public client facade.
//!
//! A thin struct holding configuration plus collaborators (rate limiter,
//! breaker, executor) behind a single pipeline entry point, rather than a
//! generic inner `Service`.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::breaker::CircuitBreaker;
use crate::config::{ClientConfig, ClientConfigBuilder};
use crate::error::ClientError;
use crate::events::{EventListener, EventListeners};
use crate::executor::Executor;
use crate::observability;
use crate::pipeline::Pipeline;
use crate::ratelimiter::RateLimiter;
use crate::request::{RequestBuilder, Response};

/// A resilient HTTP client: retries, backoff, an optional circuit breaker,
/// an optional rate limiter, and replayable request bodies wrapped around a
/// pluggable [`crate::transport::Transport`].
///
/// Cheaply cloneable: internally an `Arc<Pipeline>`, following the same
/// "clone the handle, share the guts" shape as `reqwest::Client`.
#[derive(Clone)]
pub struct Client {
    pipeline: Arc<Pipeline>,
}

impl Client {
    /// Builds a client from a fully assembled [`ClientConfig`].
    pub fn new(config: ClientConfig) -> Self {
        Self::with_events(config, EventListeners::new())
    }

    /// Builds a client and registers a single event listener up front,
    /// useful when the listener must observe circuit-breaker transitions
    /// emitted before the first request (e.g. a health endpoint).
    pub fn with_listener<L>(config: ClientConfig, listener: L) -> Self
    where
        L: EventListener + 'static,
    {
        let mut events = EventListeners::new();
        events.add(listener);
        Self::with_events(config, events)
    }

    fn with_events(mut config: ClientConfig, mut events: EventListeners) -> Self {
        observability::describe();

        // Hooks registered on the retry/rate-limiter builders
        // (`on_retry`, `on_rate_limited`) feed the same pipeline-level
        // listener set as a blanket `with_listener` registration; the
        // circuit breaker's own `on_state_change` hooks were already wired
        // into its dedicated `EventListeners` when it was constructed.
        events.merge(std::mem::take(&mut config.retry.events));
        if let Some(rate_limiter_config) = &mut config.rate_limiter {
            events.merge(std::mem::take(&mut rate_limiter_config.events));
        }

        let rate_limiter = config.rate_limiter.as_ref().map(|c| Arc::new(RateLimiter::new(c)));
        let executor = Executor::new(config.transport);

        let seed = crate::backoff::seed_for_name(&config.name);

        let pipeline = Pipeline {
            retry: config.retry,
            overall_timeout: config.timeout,
            per_try_timeout: config.per_try_timeout,
            executor,
            circuit_breaker: config.circuit_breaker,
            rate_limiter,
            events,
            seed,
        };

        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// A new [`ClientConfigBuilder`] with spec-default settings.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// The client's circuit breaker, if one is configured. Exposed so a
    /// caller can `reset()` it manually or inspect [`CircuitBreaker::state`]
    /// from a health-check handler.
    pub fn circuit_breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.pipeline.circuit_breaker.as_ref()
    }

    /// Runs one request through the full pipeline.
    pub async fn execute(&self, method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Result<Response, ClientError> {
        let mut builder = RequestBuilder::new(method, url).body(body);
        for (name, value) in headers.iter() {
            builder = builder.header(name.clone(), value.clone());
        }
        self.pipeline.execute(builder.build(None)).await
    }

    pub async fn get(&self, url: Url) -> Result<Response, ClientError> {
        self.execute(Method::GET, url, HeaderMap::new(), Bytes::new()).await
    }

    pub async fn head(&self, url: Url) -> Result<Response, ClientError> {
        self.execute(Method::HEAD, url, HeaderMap::new(), Bytes::new()).await
    }

    pub async fn delete(&self, url: Url) -> Result<Response, ClientError> {
        self.execute(Method::DELETE, url, HeaderMap::new(), Bytes::new()).await
    }

    pub async fn post(&self, url: Url, body: impl Into<Bytes>) -> Result<Response, ClientError> {
        self.execute(Method::POST, url, HeaderMap::new(), body.into()).await
    }

    pub async fn put(&self, url: Url, body: impl Into<Bytes>) -> Result<Response, ClientError> {
        self.execute(Method::PUT, url, HeaderMap::new(), body.into()).await
    }

    pub async fn patch(&self, url: Url, body: impl Into<Bytes>) -> Result<Response, ClientError> {
        self.execute(Method::PATCH, url, HeaderMap::new(), body.into()).await
    }

    /// Starts a request with full control over method, headers, and body.
    /// Returns a [`RequestBuilder`] so callers can attach an
    /// `Idempotency-Key` before submitting.
    pub fn request(&self, method: Method, url: Url) -> RequestHandle<'_> {
        RequestHandle {
            client: self,
            builder: RequestBuilder::new(method, url),
        }
    }
}

/// A request under construction, bound to the [`Client`] that will send it.
pub struct RequestHandle<'a> {
    client: &'a Client,
    builder: RequestBuilder,
}

impl<'a> RequestHandle<'a> {
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<http::HeaderValue>,
    {
        self.builder = self.builder.header(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    pub async fn send(self) -> Result<Response, ClientError> {
        let request = self.builder.build(None);
        self.client.pipeline.execute(request).await
    }
}
