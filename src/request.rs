//! The immutable request descriptor and per-attempt bookkeeping.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::error::ClientError;

/// An immutable record produced once per user call. After entering the
/// pipeline this is never mutated; each attempt derives a fresh
/// transport-level request from it.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub overall_deadline: Option<Instant>,
}

impl RequestDescriptor {
    /// Declared content length: the buffer's length, never `-1`/unknown once
    /// the body has been drained.
    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// An `Idempotency-Key` header value, if present and non-empty.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.headers
            .get("idempotency-key")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    }

    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }
}

/// A builder used to assemble a [`RequestDescriptor`] once per user call.
///
/// Functional-option style: additive for headers, last-writer-wins for body.
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: TryInto<http::HeaderName>,
        V: TryInto<http::HeaderValue>,
    {
        if let (Ok(key), Ok(value)) = (key.try_into(), value.try_into()) {
            self.headers.append(key, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self, overall_deadline: Option<Instant>) -> RequestDescriptor {
        RequestDescriptor {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            overall_deadline,
        }
    }
}

/// What happened on one attempt, before retry-policy classification.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// A response was received from the transport.
    Response { status: u16 },
    /// The transport reported an error that isn't a deadline.
    TransientError,
    /// A deadline (overall/per-try/context/connection) elapsed.
    Timeout(crate::error::TimeoutKind),
    /// A non-retryable transport-level error.
    TerminalError,
}

/// Retryable vs terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Retryable,
    Terminal,
}

/// One attempt's full lifecycle record.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: Instant,
    pub ended_at: Instant,
    pub outcome: AttemptOutcome,
    pub status: Option<u16>,
    pub classification: Classification,
    pub retry_after: Option<Duration>,
}

impl AttemptRecord {
    pub fn duration(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }
}

/// A successful response handed back to the caller.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub attempts: u32,
}

pub type PipelineResult = Result<Response, ClientError>;
