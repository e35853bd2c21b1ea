//! A resilient HTTP client core: retry with jittered backoff, an optional
//! circuit breaker, an optional token-bucket rate limiter, replayable
//! request bodies, and observability, wrapped around a pluggable transport.
//!
//! ```no_run
//! use resilient_client::Client;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(Client::builder().name("payments-api").build());
//! let response = client.get("https://example.com/health".parse()?).await?;
//! println!("status: {}", response.status);
//! # Ok(())
//! # }
//! ```

mod backoff;
mod body;
mod breaker;
mod client;
mod config;
mod error;
mod events;
mod executor;
mod observability;
mod pipeline;
mod ratelimiter;
mod request;
mod retry;
mod transport;

pub use breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitState,
};
pub use client::{Client, RequestHandle};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, TimeoutError, TimeoutKind};
pub use events::{EventListener, FnListener, PipelineEvent};
pub use ratelimiter::{RateLimiter, RateLimiterConfig, RateLimiterConfigBuilder};
pub use request::{AttemptOutcome, AttemptRecord, Classification, RequestBuilder, RequestDescriptor, Response};
pub use retry::{default_retry_methods, default_retry_status_codes, RetryConfig, RetryConfigBuilder};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportErrorKind, TransportRequest, TransportResponse};
