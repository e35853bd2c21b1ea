//! Top-level execution loop: admission → breaker check → execute →
//! classify → sleep → repeat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backoff;
use crate::body::ReplayBody;
use crate::breaker::{Admission, CircuitBreaker};
use crate::error::{ClientError, TimeoutError, TimeoutKind};
use crate::events::{EventListeners, PipelineEvent};
use crate::executor::Executor;
use crate::observability::{self, RequestLabels};
use crate::ratelimiter::RateLimiter;
use crate::request::{AttemptOutcome, Classification, RequestDescriptor, Response};
use crate::retry::{self, RetryConfig};

pub struct Pipeline {
    pub(crate) retry: RetryConfig,
    pub(crate) overall_timeout: Option<Duration>,
    pub(crate) per_try_timeout: Option<Duration>,
    pub(crate) executor: Executor,
    pub(crate) circuit_breaker: Option<Arc<CircuitBreaker>>,
    pub(crate) rate_limiter: Option<Arc<RateLimiter>>,
    pub(crate) events: EventListeners,
    pub(crate) seed: u64,
}

impl Pipeline {
    /// Runs the full pipeline for one user-level request.
    pub async fn execute(&self, mut request: RequestDescriptor) -> Result<Response, ClientError> {
        if self.retry.max_attempts == 0 {
            return Err(ClientError::InvalidConfig("max_attempts must be >= 1"));
        }

        let started = Instant::now();
        let overall_deadline = self.overall_timeout.map(|d| started + d);
        request.overall_deadline = match (request.overall_deadline, overall_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };

        let method_str = request.method.to_string();
        let host = request.host();
        let labels = RequestLabels {
            method: &method_str,
            host: &host,
        };

        #[cfg(feature = "tracing")]
        let _root_span = observability::root_span(&method_str, &host, request.url.path()).entered();

        observability::record_inflight_start(&labels);
        observability::record_request_size(&labels, request.content_length());

        let body = ReplayBody::from_bytes(request.body.clone());

        let mut attempt: u32 = 0;
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<ClientError> = None;

        let result = loop {
            attempt += 1;

            // Step 1: overall deadline check.
            if let Some(deadline) = request.overall_deadline {
                if Instant::now() >= deadline {
                    break Err(ClientError::Timeout(TimeoutError::new(
                        request.method.clone(),
                        &request.url,
                        attempt,
                        self.retry.max_attempts,
                        self.overall_timeout,
                        self.per_try_timeout,
                        started.elapsed(),
                        TimeoutKind::Overall,
                        self.retry.retry_enabled,
                    )));
                }
            }

            // Step 2: rate limiter admission.
            if let Some(limiter) = &self.rate_limiter {
                let waited = match limiter.acquire(request.overall_deadline).await {
                    Ok(waited) => waited,
                    Err(err) => break Err(err),
                };
                if waited > Duration::ZERO {
                    self.events.emit(&PipelineEvent::RateLimited {
                        name: self.retry.name.clone(),
                        timestamp: Instant::now(),
                        waited,
                    });
                }
            }

            // Step 3: circuit breaker check.
            if let Some(breaker) = &self.circuit_breaker {
                match breaker.try_acquire(last_status) {
                    Admission::Admitted => {}
                    Admission::Rejected { last_status } => {
                        break Err(ClientError::CircuitOpen { last_status });
                    }
                }
            }

            #[cfg(feature = "tracing")]
            let _attempt_span = observability::attempt_span(attempt).entered();

            // Step 4/5: execute this attempt.
            let executed = self
                .executor
                .execute(&request, &body, attempt, self.per_try_timeout)
                .await;

            last_status = executed.record.status;

            // Step 6: feed the outcome to the breaker.
            if let Some(breaker) = &self.circuit_breaker {
                match &executed.record.outcome {
                    AttemptOutcome::Response { status } => {
                        if breaker.is_failure_status(*status) {
                            breaker.record_failure();
                        } else {
                            breaker.record_success();
                        }
                    }
                    AttemptOutcome::TransientError
                    | AttemptOutcome::Timeout(_)
                    | AttemptOutcome::TerminalError => {
                        breaker.record_failure();
                    }
                }
            }

            // Step 7: ask the retry policy. A terminal classification on a
            // `Response` outcome is still a response, not an error — it is
            // returned to the caller as-is whether that's because its status
            // isn't retryable at all or because method gating (rule 5) ruled
            // this particular attempt out. Only non-`Response` outcomes
            // (transport errors, timeouts) produce a `ClientError` here.
            let attempts_remaining = (attempt as usize) < self.retry.max_attempts;
            let classification =
                retry::classify(&executed.record.outcome, &request, &self.retry, attempts_remaining);

            match classification {
                Classification::Terminal => {
                    if let AttemptOutcome::Response { status } = &executed.record.outcome {
                        observability::record_response_size(
                            &labels,
                            *status,
                            executed.response_body.as_ref().map(|b| b.len() as u64).unwrap_or(0),
                        );
                        self.events.emit(&PipelineEvent::Success {
                            name: self.retry.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        break Ok(Response {
                            status: *status,
                            headers: executed.response_headers.unwrap_or_default(),
                            body: executed.response_body.unwrap_or_default(),
                            attempts: attempt,
                        });
                    }

                    let attempt_error = outcome_to_error(&request, &executed, attempt, self.retry.max_attempts, self.overall_timeout, self.per_try_timeout, self.retry.retry_enabled);
                    self.events.emit(&PipelineEvent::Exhausted {
                        name: self.retry.name.clone(),
                        timestamp: Instant::now(),
                        attempts: attempt,
                    });
                    break Err(attempt_error);
                }
                Classification::Retryable => {
                    let attempt_error = outcome_to_error(&request, &executed, attempt, self.retry.max_attempts, self.overall_timeout, self.per_try_timeout, self.retry.retry_enabled);
                    last_error = Some(attempt_error);

                    if (attempt as usize) >= self.retry.max_attempts {
                        self.events.emit(&PipelineEvent::Exhausted {
                            name: self.retry.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt,
                        });
                        break Err(ClientError::MaxAttemptsExceeded {
                            max_attempts: self.retry.max_attempts,
                            last_error: Box::new(last_error.take().unwrap()),
                        });
                    }

                    // Step 9: compute delay, honoring Retry-After if present.
                    let mut sleep_for =
                        backoff::delay(attempt + 1, self.retry.base_delay, self.retry.max_delay, self.retry.jitter, self.seed);

                    if self.retry.respect_retry_after {
                        if let Some(headers) = &executed.response_headers {
                            if let Some(value) = headers.get("retry-after").and_then(|v| v.to_str().ok()) {
                                if let Some(overridden) = retry::parse_retry_after(value, self.retry.max_delay) {
                                    sleep_for = overridden;
                                }
                            }
                        }
                    }

                    let reason = match &executed.record.outcome {
                        AttemptOutcome::Response { status } => format!("status:{status}"),
                        AttemptOutcome::TransientError => "error:transient".to_string(),
                        AttemptOutcome::Timeout(kind) => format!("error:{kind}"),
                        AttemptOutcome::TerminalError => "error:terminal".to_string(),
                    };

                    observability::record_retry(&labels, &reason, attempt);
                    self.events.emit(&PipelineEvent::Retry {
                        name: self.retry.name.clone(),
                        timestamp: Instant::now(),
                        attempt,
                        delay: sleep_for,
                        reason,
                    });

                    if let Some(deadline) = request.overall_deadline {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            break Err(ClientError::Timeout(TimeoutError::new(
                                request.method.clone(),
                                &request.url,
                                attempt,
                                self.retry.max_attempts,
                                self.overall_timeout,
                                self.per_try_timeout,
                                started.elapsed(),
                                TimeoutKind::Overall,
                                self.retry.retry_enabled,
                            )));
                        }
                        sleep_for = sleep_for.min(remaining);
                    }

                    tokio::time::sleep(sleep_for).await;
                }
            }
        };

        observability::record_inflight_end(&labels);
        observability::record_request_complete(
            &labels,
            last_status,
            attempt > 1,
            result.is_err(),
            started.elapsed(),
        );

        result
    }
}

fn outcome_to_error(
    request: &RequestDescriptor,
    executed: &crate::executor::ExecutedAttempt,
    attempt: u32,
    max_attempts: usize,
    overall_timeout: Option<Duration>,
    per_try_timeout: Option<Duration>,
    retry_enabled: bool,
) -> ClientError {
    match &executed.record.outcome {
        AttemptOutcome::Response { status } => {
            ClientError::Other(format!("server responded with status {status}"))
        }
        AttemptOutcome::Timeout(kind) => ClientError::Timeout(TimeoutError::new(
            request.method.clone(),
            &request.url,
            attempt,
            max_attempts,
            overall_timeout,
            per_try_timeout,
            executed.record.duration(),
            *kind,
            retry_enabled,
        )),
        AttemptOutcome::TransientError => ClientError::Other("transient transport error".to_string()),
        AttemptOutcome::TerminalError => ClientError::Other("terminal transport error".to_string()),
    }
}
