//! A small callback-based event system, independent of the `tracing`/`metrics`
//! feature gates, so callers can observe pipeline transitions without
//! depending on either.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::breaker::CircuitState;

/// Something the pipeline, breaker, or rate limiter did that a caller might
/// want to observe.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A circuit breaker transitioned from one state to another.
    StateTransition {
        name: String,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// An attempt is about to be retried.
    Retry {
        name: String,
        timestamp: Instant,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The request succeeded (on the first attempt or after retries).
    Success {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The pipeline gave up and returned a terminal error.
    Exhausted {
        name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The rate limiter delayed admission.
    RateLimited {
        name: String,
        timestamp: Instant,
        waited: Duration,
    },
}

/// Trait for listening to [`PipelineEvent`]s.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// A function-based listener, for the common case of a closure registered
/// through a config builder (`on_retry`, `on_state_change`, ...).
pub struct FnListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn on_event(&self, event: &PipelineEvent) {
        (self.f)(event)
    }
}

impl fmt::Debug for dyn EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventListener")
    }
}

/// A collection of event listeners, cheaply cloneable via `Arc`.
#[derive(Clone, Default, Debug)]
pub struct EventListeners {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Folds another collection's listeners into this one.
    pub(crate) fn merge(&mut self, other: EventListeners) {
        self.listeners.extend(other.listeners);
    }

    /// Registers a closure that only fires for [`PipelineEvent::Retry`].
    pub(crate) fn on_retry<F>(&mut self, f: F)
    where
        F: Fn(u32, Duration, &str) + Send + Sync + 'static,
    {
        self.add(FnListener::new(move |event: &PipelineEvent| {
            if let PipelineEvent::Retry { attempt, delay, reason, .. } = event {
                f(*attempt, *delay, reason);
            }
        }));
    }

    /// Registers a closure that only fires for [`PipelineEvent::StateTransition`].
    pub(crate) fn on_state_change<F>(&mut self, f: F)
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.add(FnListener::new(move |event: &PipelineEvent| {
            if let PipelineEvent::StateTransition { from, to, .. } = event {
                f(*from, *to);
            }
        }));
    }

    /// Registers a closure that only fires for [`PipelineEvent::RateLimited`].
    pub(crate) fn on_rate_limited<F>(&mut self, f: F)
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.add(FnListener::new(move |event: &PipelineEvent| {
            if let PipelineEvent::RateLimited { waited, .. } = event {
                f(*waited);
            }
        }));
    }

    /// Emits an event to every listener. A panicking listener is caught so
    /// one misbehaving callback cannot take down the pipeline or starve the
    /// remaining listeners.
    pub fn emit(&self, event: &PipelineEvent) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!("event listener panicked while handling {:?}", event);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
