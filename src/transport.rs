//! The pluggable transport the executor invokes.
//!
//! Connection pooling, TLS, and HTTP/2 negotiation are delegated entirely to
//! the transport implementation; the default here wraps [`reqwest::Client`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

/// A transport-level request for one attempt.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A transport-level response.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whether a [`TransportError`] is a deadline expiring versus some other
/// network failure, so the executor can classify it for the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The deadline passed before the transport returned.
    Deadline,
    /// Connection refused/reset, DNS failure, or an I/O error observed
    /// before any response byte arrived — a transient network condition.
    Transient,
    /// Anything else: malformed response, protocol violation, etc.
    Other,
}

#[derive(Debug, Error)]
#[error("transport error ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn deadline(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Deadline,
            message: message.into(),
        }
    }
}

/// The abstraction the [`crate::executor::Executor`] invokes for each
/// attempt. Implement this to swap in a different HTTP stack or a test
/// double.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        deadline: Option<Instant>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport: a thin wrapper over [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        deadline: Option<Instant>,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body);

        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            builder = builder.timeout(remaining.max(Duration::from_millis(1)));
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::deadline(err.to_string())
    } else if err.is_connect() {
        TransportError::transient(err.to_string())
    } else {
        TransportError::other(err.to_string())
    }
}
