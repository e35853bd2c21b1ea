//! Circuit breaker: a three-state guard (Closed/Open/HalfOpen) in front of
//! the remote endpoint.
//!
//! An `AtomicU8` mirror of the state lets readers check "is this open"
//! without taking the lock, while all mutating transitions happen under a
//! single `std::sync::Mutex` — all reads of state and updates to counters
//! occur under one mutual-exclusion region. Failure detection uses plain
//! consecutive-count thresholds rather than a sliding failure-rate window.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::events::{EventListeners, PipelineEvent};

/// The circuit breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for the circuit breaker.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub name: String,
    pub widen_to_4xx: bool,
    pub(crate) events: EventListeners,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            name: "<unnamed>".to_string(),
            widen_to_4xx: false,
            events: EventListeners::new(),
        }
    }
}

/// Builder for [`CircuitBreakerConfig`].
#[derive(Clone, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
        }
    }

    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.config.failure_threshold = n;
        self
    }

    pub fn success_threshold(mut self, n: u32) -> Self {
        self.config.success_threshold = n;
        self
    }

    pub fn timeout(mut self, d: Duration) -> Self {
        self.config.timeout = d;
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    /// Widens "what counts as a failure" to include 4xx statuses, not just
    /// transport errors and 5xx.
    pub fn widen_to_4xx(mut self, yes: bool) -> Self {
        self.config.widen_to_4xx = yes;
        self
    }

    /// Registers a callback invoked whenever the breaker transitions state.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.config.events.on_state_change(f);
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        self.config
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Instant,
    half_open_probe_in_flight: bool,
}

/// The circuit breaker itself. Each client exclusively owns one instance, or
/// may share a caller-supplied `Arc<CircuitBreaker>`; a shared breaker lives
/// as long as its longest-lived holder.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state_atomic: Arc<AtomicU8>,
    inner: Mutex<Inner>,
    events: EventListeners,
}

/// What the breaker decided about an attempt. A rejection optionally
/// carries the last observed failure status for caller inspection.
pub enum Admission {
    Admitted,
    Rejected { last_status: Option<u16> },
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let events = config.events.clone();
        Self::with_events(config, events)
    }

    pub(crate) fn with_events(config: CircuitBreakerConfig, events: EventListeners) -> Self {
        Self {
            config,
            state_atomic: Arc::new(AtomicU8::new(CircuitState::Closed as u8)),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: Instant::now(),
                half_open_probe_in_flight: false,
            }),
            events,
        }
    }

    /// Lock-free read of the current state, for callers that just want a
    /// snapshot (e.g. health checks) without contending the mutex.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Queried on each attempt before it is sent.
    ///
    /// `HalfOpen` admits exactly one outstanding probe at a time: a second
    /// caller arriving while the first probe is still in flight is rejected
    /// rather than also being let through, so a still-failing endpoint only
    /// ever sees one concurrent probe.
    pub fn try_acquire(&self, last_status: Option<u16>) -> Admission {
        let mut inner = self.inner.lock().unwrap();

        match inner.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.config.timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_probe_in_flight = true;
                    Admission::Admitted
                } else {
                    Admission::Rejected { last_status }
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Admission::Rejected { last_status }
                } else {
                    inner.half_open_probe_in_flight = true;
                    Admission::Admitted
                }
            }
        }
    }

    /// Whether `status` counts as a breaker failure: transport errors and
    /// 5xx always do, 4xx only when widened by configuration.
    pub fn is_failure_status(&self, status: u16) -> bool {
        status >= 500 || (self.config.widen_to_4xx && (400..500).contains(&status))
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_probe_in_flight = false;
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("http_client_circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "success").increment(1);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_probe_in_flight = false;
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("http_client_circuitbreaker_calls_total", "circuitbreaker" => self.config.name.clone(), "outcome" => "failure").increment(1);
    }

    /// Forces the breaker back to `Closed` and clears counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.transition(&mut inner, CircuitState::Closed);
    }

    /// Called synchronously under the breaker's lock; must not call back
    /// into the client.
    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;

        inner.state = to;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.opened_at = Instant::now();
        inner.half_open_probe_in_flight = false;
        self.state_atomic.store(to as u8, Ordering::Release);

        self.events.emit(&PipelineEvent::StateTransition {
            name: self.config.name.clone(),
            timestamp: Instant::now(),
            from,
            to,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(circuitbreaker = %self.config.name, ?from, ?to, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        metrics::gauge!("http_client_circuitbreaker_state", "circuitbreaker" => self.config.name.clone()).set(to as u8 as f64);
    }
}
