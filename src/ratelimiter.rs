//! Token-bucket rate limiter.
//!
//! A single continuous-refill algorithm behind an `Arc<Mutex<State>>` and a
//! sleep-then-retry acquire loop.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::error::ClientError;
use crate::events::EventListeners;

/// Configuration for the rate limiter.
#[derive(Clone, Debug)]
pub struct RateLimiterConfig {
    pub requests_per_second: f64,
    pub burst_capacity: u32,
    pub(crate) events: EventListeners,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 50.0,
            burst_capacity: 50,
            events: EventListeners::new(),
        }
    }
}

/// Builder for [`RateLimiterConfig`].
#[derive(Clone, Debug, Default)]
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RateLimiterConfig::default(),
        }
    }

    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.config.requests_per_second = rps;
        self
    }

    pub fn burst_capacity(mut self, capacity: u32) -> Self {
        self.config.burst_capacity = capacity;
        self
    }

    /// Registers a callback invoked whenever admission is delayed waiting
    /// for a token, receiving how long the caller waited.
    pub fn on_rate_limited<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.config.events.on_rate_limited(f);
        self
    }

    pub fn build(self) -> RateLimiterConfig {
        self.config
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket admission control. The bucket starts full; tokens refill
/// continuously at `rate` and never exceed `capacity`.
pub struct RateLimiter {
    capacity: f64,
    rate: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            capacity: config.burst_capacity as f64,
            rate: config.requests_per_second,
            state: Mutex::new(BucketState {
                tokens: config.burst_capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Attempts to take one token without blocking. Returns `true` if one
    /// was available.
    fn try_take(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until at least one token will be available, given the
    /// current (already-refilled) state.
    fn wait_for_next_token(&self) -> Duration {
        let state = self.state.lock().unwrap();
        let deficit = 1.0 - state.tokens;
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / self.rate)
        }
    }

    /// Admits one request, blocking until a token accrues or `deadline`
    /// passes. If the deadline expires first, fails with
    /// [`ClientError::RateLimitTimeout`] and no attempt is made.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<Duration, ClientError> {
        let started = Instant::now();

        loop {
            if self.try_take() {
                return Ok(started.elapsed());
            }

            let wait = self.wait_for_next_token();

            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ClientError::RateLimitTimeout);
                }
                if wait > remaining {
                    // Waiting the full amount would blow through the caller's
                    // deadline; sleep only what's left, then re-check so the
                    // next loop iteration reports the timeout cleanly.
                    sleep(remaining).await;
                    continue;
                }
            }

            sleep(wait.max(Duration::from_micros(1))).await;
        }
    }
}
