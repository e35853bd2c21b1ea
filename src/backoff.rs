//! Pure backoff-delay calculation.
//!
//! `delay` is a pure function of its arguments: the same `(attempt, seed)`
//! pair always produces the same jittered duration, which is what lets the
//! pipeline replay or test backoff behavior deterministically. Jitter comes
//! from a seeded `fastrand::Rng`, not the thread-global generator, so calling
//! `delay` twice with identical arguments is guaranteed to agree.

use std::time::Duration;

/// Computes the backoff delay before the given attempt.
///
/// `attempt` is 1-based; attempt 1 is the first try and always returns
/// `Duration::ZERO`. For `attempt >= 2`, the expected delay is
/// `base * 2^(attempt - 2)`; a jitter factor drawn uniformly from
/// `[1 - jitter, 1 + jitter]` is applied to that *unclamped* expected value,
/// and only the jittered result is clamped to `cap`. Clamping before
/// jittering would let a large expected value collapse below `cap` once
/// multiplied by a sub-1.0 factor, which defeats the cap's purpose of
/// bounding the final delay, not the pre-jitter one.
///
/// `jitter == 0.0` disables randomization entirely.
pub fn delay(attempt: u32, base: Duration, cap: Duration, jitter: f64, seed: u64) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }

    let exponent = (attempt - 2) as f64;
    let expected_nanos = base.as_nanos() as f64 * 2f64.powf(exponent);

    let factor = if jitter <= 0.0 {
        1.0
    } else {
        let mut rng = fastrand::Rng::with_seed(seed_for(seed, attempt));
        let spread = jitter.clamp(0.0, 1.0);
        1.0 - spread + rng.f64() * (2.0 * spread)
    };

    let jittered_nanos = (expected_nanos * factor).max(0.0);
    let jittered = Duration::from_nanos(jittered_nanos as u64);
    jittered.min(cap)
}

/// Derives a stable per-client seed from its configured name, so two
/// clients built with the same name (e.g. across process restarts in a
/// test) produce identical jitter sequences.
pub fn seed_for_name(name: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Derives a deterministic per-attempt seed from a process/request seed.
///
/// Splitmix-style mixing so nearby `(seed, attempt)` pairs don't produce
/// visibly correlated low bits.
fn seed_for(seed: u64, attempt: u32) -> u64 {
    let mut z = seed.wrapping_add(attempt as u64).wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
