use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use resilient_client::{Transport, TransportError, TransportRequest, TransportResponse};

/// A transport driven by a queue of scripted outcomes, one per call. Records
/// every request it receives for assertions on retry count, body replay, and
/// timing.
pub struct MockTransport {
    script: Mutex<Vec<Step>>,
    received: Mutex<Vec<TransportRequest>>,
    call_times: Mutex<Vec<Instant>>,
}

pub enum Step {
    Response(u16),
    ResponseWithHeader(u16, &'static str, &'static str),
    Transient,
    Deadline,
    /// Sleeps for the given duration before reporting a deadline error, so
    /// callers can exercise genuine wall-clock timeout interplay instead of
    /// racing a zero-duration deadline.
    DelayedDeadline(Duration),
}

impl MockTransport {
    pub fn new(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            received: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<bytes::Bytes> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.body.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransportRequest,
        _deadline: Option<Instant>,
    ) -> Result<TransportResponse, TransportError> {
        self.received.lock().unwrap().push(request);
        self.call_times.lock().unwrap().push(Instant::now());

        let step = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                panic!("MockTransport script exhausted");
            }
            script.remove(0)
        };

        match step {
            Step::Response(status) => Ok(TransportResponse {
                status,
                headers: http::HeaderMap::new(),
                body: bytes::Bytes::new(),
            }),
            Step::ResponseWithHeader(status, name, value) => {
                let mut headers = http::HeaderMap::new();
                headers.insert(
                    http::HeaderName::from_static(name),
                    http::HeaderValue::from_static(value),
                );
                Ok(TransportResponse {
                    status,
                    headers,
                    body: bytes::Bytes::new(),
                })
            }
            Step::Transient => Err(TransportError::transient("connection refused")),
            Step::Deadline => Err(TransportError::deadline("timed out")),
            Step::DelayedDeadline(duration) => {
                tokio::time::sleep(duration).await;
                Err(TransportError::deadline("timed out"))
            }
        }
    }
}
