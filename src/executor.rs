//! Single-attempt execution.
//!
//! Splits a transport call's result three ways — response, inner error, or
//! elapsed deadline — the same split needed to distinguish a per-try
//! deadline from an overall one.

use std::sync::Arc;
use std::time::Instant;

use crate::body::ReplayBody;
use crate::error::TimeoutKind;
use crate::request::{AttemptOutcome, AttemptRecord, Classification, RequestDescriptor};
use crate::transport::{Transport, TransportError, TransportErrorKind, TransportRequest};

/// Executes exactly one attempt against the transport.
pub struct Executor {
    transport: Arc<dyn Transport>,
}

/// The raw result of one attempt, before retry-policy classification.
pub struct ExecutedAttempt {
    pub record: AttemptRecord,
    pub response_body: Option<bytes::Bytes>,
    pub response_headers: Option<http::HeaderMap>,
}

impl Executor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Runs one attempt. `per_try_timeout` and the request's overall deadline
    /// are combined into the effective per-attempt deadline:
    /// `min(per-try, remaining-overall)`.
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        body: &ReplayBody,
        attempt: u32,
        per_try_timeout: Option<std::time::Duration>,
    ) -> ExecutedAttempt {
        let started_at = Instant::now();

        let per_try_deadline = per_try_timeout.map(|d| started_at + d);
        let effective_deadline = match (per_try_deadline, request.overall_deadline) {
            (Some(p), Some(o)) => Some(p.min(o)),
            (Some(p), None) => Some(p),
            (None, Some(o)) => Some(o),
            (None, None) => None,
        };

        let transport_request = TransportRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: body.reader(),
        };

        let result = self
            .transport
            .send(transport_request, effective_deadline)
            .await;

        let ended_at = Instant::now();

        let (outcome, status, response_body, response_headers) = match result {
            Ok(response) => (
                AttemptOutcome::Response {
                    status: response.status,
                },
                Some(response.status),
                Some(response.body),
                Some(response.headers),
            ),
            Err(err) => (
                self.classify_transport_error(&err, per_try_deadline, request.overall_deadline),
                None,
                None,
                None,
            ),
        };

        let record = AttemptRecord {
            attempt,
            started_at,
            ended_at,
            outcome,
            status,
            // The executor doesn't decide retryability; it stamps a
            // placeholder here that the pipeline immediately overwrites
            // after consulting the retry policy.
            classification: Classification::Terminal,
            retry_after: None,
        };

        ExecutedAttempt {
            record,
            response_body,
            response_headers,
        }
    }

    fn classify_transport_error(
        &self,
        err: &TransportError,
        per_try_deadline: Option<Instant>,
        overall_deadline: Option<Instant>,
    ) -> AttemptOutcome {
        match err.kind {
            TransportErrorKind::Deadline => {
                let now = Instant::now();
                let overall_expired = overall_deadline.is_some_and(|d| now >= d);
                let per_try_expired = per_try_deadline.is_some_and(|d| now >= d);

                let kind = if overall_expired && (!per_try_expired || overall_deadline < per_try_deadline)
                {
                    TimeoutKind::Overall
                } else {
                    TimeoutKind::PerTry
                };
                AttemptOutcome::Timeout(kind)
            }
            TransportErrorKind::Transient => AttemptOutcome::TransientError,
            TransportErrorKind::Other => AttemptOutcome::TerminalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;
    use crate::transport::{TransportResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedTransport {
        responses: std::sync::Mutex<Vec<Result<TransportResponse, TransportError>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _request: TransportRequest,
            _deadline: Option<Instant>,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn executes_and_records_status() {
        let transport = Arc::new(ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Ok(TransportResponse {
                status: 200,
                headers: http::HeaderMap::new(),
                body: bytes::Bytes::new(),
            })]),
            calls: AtomicUsize::new(0),
        });

        let executor = Executor::new(transport.clone());
        let request = RequestBuilder::new(http::Method::GET, url::Url::parse("https://example.com").unwrap())
            .build(None);
        let body = ReplayBody::empty();

        let result = executor.execute(&request, &body, 1, None).await;
        assert_eq!(result.record.status, Some(200));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn classifies_transient_transport_error() {
        let transport = Arc::new(ScriptedTransport {
            responses: std::sync::Mutex::new(vec![Err(TransportError::transient("refused"))]),
            calls: AtomicUsize::new(0),
        });

        let executor = Executor::new(transport);
        let request = RequestBuilder::new(http::Method::GET, url::Url::parse("https://example.com").unwrap())
            .build(None);
        let body = ReplayBody::empty();

        let result = executor.execute(&request, &body, 1, None).await;
        assert!(matches!(result.record.outcome, AttemptOutcome::TransientError));
    }
}
