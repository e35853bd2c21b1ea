//! Error taxonomy for the resilient HTTP client.
//!
//! [`ClientError`] unifies everything the pipeline can return: structured
//! terminal errors produced by the pipeline itself, and passthrough
//! transport errors from whatever [`crate::transport::Transport`] is in use.

use std::time::Duration;

use thiserror::Error;

/// Which deadline fired, for [`TimeoutError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// The overall pipeline deadline elapsed.
    Overall,
    /// A single attempt's per-try deadline elapsed.
    PerTry,
    /// The caller's cancellation/context signal fired.
    Context,
    /// The transport reported the connection phase itself timed out.
    Connection,
}

impl TimeoutKind {
    fn as_str(&self) -> &'static str {
        match self {
            TimeoutKind::Overall => "overall",
            TimeoutKind::PerTry => "per-try",
            TimeoutKind::Context => "context",
            TimeoutKind::Connection => "connection",
        }
    }
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, introspectable timeout error.
#[derive(Debug, Clone, Error)]
#[error(
    "{method} {url} timed out ({kind}) after {elapsed:?} on attempt {attempt}/{max_attempts}"
)]
pub struct TimeoutError {
    pub method: http::Method,
    pub url: String,
    pub host: String,
    pub attempt: u32,
    pub max_attempts: usize,
    pub overall_timeout: Option<Duration>,
    pub per_try_timeout: Option<Duration>,
    pub elapsed: Duration,
    pub kind: TimeoutKind,
    pub retry_enabled: bool,
    pub suggestions: Vec<&'static str>,
}

impl TimeoutError {
    pub(crate) fn new(
        method: http::Method,
        url: &url::Url,
        attempt: u32,
        max_attempts: usize,
        overall_timeout: Option<Duration>,
        per_try_timeout: Option<Duration>,
        elapsed: Duration,
        kind: TimeoutKind,
        retry_enabled: bool,
    ) -> Self {
        let suggestions = match kind {
            TimeoutKind::Overall => vec![
                "increase Timeout if the endpoint is simply slow",
                "reduce PerTryTimeout so more attempts fit inside the overall budget",
            ],
            TimeoutKind::PerTry => vec![
                "increase PerTryTimeout",
                "check whether the remote host is reachable and responsive",
            ],
            TimeoutKind::Context => vec!["the caller cancelled the request before it completed"],
            TimeoutKind::Connection => vec![
                "verify DNS resolution and network reachability for the host",
                "check for a misconfigured proxy or firewall",
            ],
        };

        Self {
            method,
            url: url.to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            attempt,
            max_attempts,
            overall_timeout,
            per_try_timeout,
            elapsed,
            kind,
            retry_enabled,
            suggestions,
        }
    }
}

/// Everything the pipeline can hand back to a caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A deadline (overall, per-try, context, or connection) elapsed.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// All configured attempts were used without a terminal success.
    #[error("exhausted {max_attempts} attempt(s); last error: {last_error}")]
    MaxAttemptsExceeded {
        max_attempts: usize,
        last_error: Box<ClientError>,
    },

    /// The circuit breaker rejected this attempt.
    #[error("circuit breaker is open")]
    CircuitOpen { last_status: Option<u16> },

    /// The rate limiter's admission deadline elapsed before a token freed up.
    #[error("rate limiter timed out waiting for an admission token")]
    RateLimitTimeout,

    /// The request body could not be drained into the replay buffer.
    #[error("failed to read request body: {0}")]
    BodyRead(#[from] std::io::Error),

    /// A precondition was violated (e.g. `max_attempts == 0`).
    #[error("invalid retry configuration: {0}")]
    InvalidConfig(&'static str),

    /// The transport returned an error that isn't a timeout.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// A catch-all for conditions that don't warrant their own variant, so
    /// callers matching exhaustively on `ClientError` always have somewhere
    /// to convert an unwrapped response/error pair into.
    #[error("operation failed: {0}")]
    Other(String),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ClientError::CircuitOpen { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::RateLimitTimeout)
    }

    pub fn is_max_attempts_exceeded(&self) -> bool {
        matches!(self, ClientError::MaxAttemptsExceeded { .. })
    }

    /// The HTTP status code this error carries, if any was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::CircuitOpen { last_status } => *last_status,
            ClientError::MaxAttemptsExceeded { last_error, .. } => last_error.status(),
            _ => None,
        }
    }
}
