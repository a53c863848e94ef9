//! Randomized pacing between sends and receives.
//!
//! Workers "stagger" between messages for a random amount of time so that
//! many producers and consumers do not fall into lock-step. Delays are drawn
//! uniformly from `[min, max)` and scaled by a per-role factor, so every
//! delay lands in `[factor * min, factor * max)`.

use std::time::Duration;

use crate::env::Environment;

/// Default upper bound of a stagger delay before scaling.
pub const DEFAULT_MAX_STAGGER: Duration = Duration::from_secs(1);

/// Default lower bound of a stagger delay before scaling.
pub const DEFAULT_MIN_STAGGER: Duration = Duration::from_millis(100);

/// Draws stagger delays from an [`Environment`]'s randomness.
#[derive(Debug, Clone)]
pub struct StaggerScheduler<E> {
    env: E,
    min: Duration,
    max: Duration,
}

impl<E: Environment> StaggerScheduler<E> {
    /// Scheduler with the default `[100ms, 1s)` window.
    pub fn new(env: E) -> Self {
        Self::with_bounds(env, DEFAULT_MIN_STAGGER, DEFAULT_MAX_STAGGER)
    }

    /// Scheduler with an explicit window.
    pub fn with_bounds(env: E, min: Duration, max: Duration) -> Self {
        Self { env, min, max }
    }

    /// Next delay for this scheduler's window, scaled by `factor`.
    pub fn next_delay(&self, factor: f64) -> Duration {
        next_delay(&self.env, self.min, self.max, factor)
    }

    /// Sleep for [`Self::next_delay`] and return the delay slept.
    pub async fn pause(&self, factor: f64) -> Duration {
        let delay = self.next_delay(factor);
        self.env.sleep(delay).await;
        delay
    }
}

/// Delay drawn uniformly from `[min, max)` and scaled by `factor`.
///
/// A degenerate window (`max <= min`) yields `factor * min`. Non-positive or
/// non-finite factors yield zero.
///
/// Bounds hold at nanosecond resolution. The scaled value is truncated to
/// whole nanoseconds, so a delay can fall short of the real-valued
/// `factor * min` by less than 1ns; it never drops below that product
/// truncated.
pub fn next_delay(env: &impl Environment, min: Duration, max: Duration, factor: f64) -> Duration {
    if !factor.is_finite() || factor <= 0.0 {
        return Duration::ZERO;
    }

    let min_nanos = saturating_nanos(min);
    let max_nanos = saturating_nanos(max);
    let offset = env.random_below(max_nanos.saturating_sub(min_nanos));

    // Truncation keeps the result strictly below factor * max.
    let scaled = (min_nanos + offset) as f64 * factor;
    Duration::from_nanos(scaled as u64)
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
