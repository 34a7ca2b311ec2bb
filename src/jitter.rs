//! Jitter applied on top of a computed backoff.
//!
//! When to use which strategy:
//! - `None`: deterministic waits. This is the sink default.
//! - `Full`: uniform in `[0, delay]`.
//! - `Equal`: uniform in `[delay/2, delay]`, keeps a floor while adding randomness.
//! - `Proportional(p)`: uniform in `[delay*(1-p), delay*(1+p)]`, spreads reconnects of many
//!   sinks that failed at the same moment around the nominal delay.
//!
//! Precision: jitter works in microseconds and saturates to `u64::MAX` on huge durations.

use rand::{rng, Rng};
use std::time::Duration;

/// Errors from jitter construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("jitter ratio must be within [0, 1] (got {0})")]
pub struct InvalidJitterRatio(pub f64);

/// Jitter strategy for randomizing backoff waits.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Jitter {
    /// Use the exact backoff delay
    #[default]
    None,
    /// Random between 0 and delay
    Full,
    /// Random between delay/2 and delay
    Equal,
    /// Random within +/- ratio of the delay
    Proportional(f64),
}

impl Jitter {
    pub fn full() -> Self {
        Jitter::Full
    }

    pub fn equal() -> Self {
        Jitter::Equal
    }

    /// Proportional spread around the delay. `ratio` must be within `[0, 1]`.
    pub fn proportional(ratio: f64) -> Result<Self, InvalidJitterRatio> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(InvalidJitterRatio(ratio));
        }
        Ok(Jitter::Proportional(ratio))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Jitter::None)
    }

    /// Apply jitter to a delay duration
    pub fn apply(&self, delay: Duration) -> Duration {
        if self.is_none() {
            return delay;
        }
        let mut rng = rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Apply jitter with a caller-provided RNG
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let micros = as_micros_saturated(delay);
        match self {
            Jitter::None => delay,
            _ if micros == 0 => Duration::ZERO,
            Jitter::Full => Duration::from_micros(rng.random_range(0..=micros)),
            Jitter::Equal => Duration::from_micros(rng.random_range(micros / 2..=micros)),
            Jitter::Proportional(ratio) => {
                let spread = ((micros as f64) * ratio.clamp(0.0, 1.0)) as u64;
                let low = micros.saturating_sub(spread);
                let high = micros.saturating_add(spread);
                Duration::from_micros(rng.random_range(low..=high))
            }
        }
    }
}

fn as_micros_saturated(duration: Duration) -> u64 {
    duration.as_micros().try_into().unwrap_or(u64::MAX)
}
