//! Reconnect backoff for drain sinks.
//!
//! Exponential growth from a base delay, doubling per attempt, clamped to a ceiling. Attempt
//! semantics differ from a classic retry loop: attempt `0` already waits `base`, so a sink never
//! dials out the instant it is created.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use drainpipe::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(100))
//!     .with_max(Duration::from_secs(2))
//!     .unwrap();
//! assert_eq!(backoff.delay(0), Duration::from_millis(100));
//! assert_eq!(backoff.delay(1), Duration::from_millis(200));
//! assert_eq!(backoff.delay(2), Duration::from_millis(400));
//! assert_eq!(backoff.delay(9), Duration::from_secs(2)); // capped
//! ```
//!
//! Overflow behavior: the exponent is clamped before exponentiation and the product saturates,
//! so any attempt value (including `usize::MAX`) returns the ceiling.

use std::fmt;
use std::time::Duration;

/// Default base delay: one millisecond.
pub const DEFAULT_BASE: Duration = Duration::from_millis(1);

/// Default ceiling: 2^22 ms (about 70 minutes), reached after 22 doublings.
pub const DEFAULT_MAX: Duration = Duration::from_millis(1 << 22);

/// Hard ceiling applied when no explicit max is configured (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

// 2^127 already saturates any u128 nanosecond product.
const MAX_EXPONENT: u32 = 127;

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::MaxMustBePositive => write!(f, "max must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

/// Pure mapping from attempt count to wait duration.
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    fn delay(&self, attempt: usize) -> Duration;
}

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    /// Exponential backoff starting at `base`, capped at [`MAX_BACKOFF`] until `with_max`.
    pub fn exponential(base: Duration) -> Self {
        Self { base, max: MAX_BACKOFF.max(base) }
    }

    /// Set the ceiling. Returns an error if `max` is zero or smaller than the base.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        if max < self.base {
            return Err(BackoffError::MaxLessThanBase { base: self.base, max });
        }
        self.max = max;
        Ok(self)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay before the given attempt (0-based; attempt 0 waits `base`).
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT as usize) as u32;
        let multiplier = 2u128.saturating_pow(exponent);
        let nanos = self.base.as_nanos().saturating_mul(multiplier);
        if nanos >= self.max.as_nanos() {
            return self.max;
        }
        // nanos < max, and max fits a Duration, so the split cannot truncate.
        Duration::new((nanos / 1_000_000_000) as u64, (nanos % 1_000_000_000) as u32)
    }

    /// First attempt whose delay equals the ceiling. Every later attempt returns the same delay.
    pub fn clamp_attempt(&self) -> usize {
        if self.base.is_zero() {
            return 0;
        }
        (0..=MAX_EXPONENT as usize).find(|&a| self.delay(a) >= self.max).unwrap_or(0)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base: DEFAULT_BASE, max: DEFAULT_MAX }
    }
}

impl BackoffStrategy for Backoff {
    fn delay(&self, attempt: usize) -> Duration {
        Backoff::delay(self, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_zero_waits_base() {
        let backoff = Backoff::exponential(Duration::from_millis(50));
        assert_eq!(backoff.delay(0), Duration::from_millis(50));
        assert_eq!(Backoff::default().delay(0), DEFAULT_BASE);
    }

    #[test]
    fn exponential_backoff_doubles_each_time() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_millis(1600));
    }

    #[test]
    fn exponential_backoff_respects_max() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();

        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // Capped
        assert_eq!(backoff.delay(10), Duration::from_secs(1)); // Still capped
    }

    #[test]
    fn delays_are_monotonic_up_to_clamp() {
        let backoff = Backoff::default();
        let clamp = backoff.clamp_attempt();
        assert_eq!(clamp, 22);
        for a in 0..clamp {
            assert!(backoff.delay(a) <= backoff.delay(a + 1), "attempt {a}");
        }
        for a in clamp..clamp + 200 {
            assert_eq!(backoff.delay(a), backoff.delay(clamp));
        }
        assert_eq!(backoff.delay(clamp), DEFAULT_MAX);
    }

    #[test]
    fn huge_attempts_saturate_without_overflow() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
        assert_eq!(backoff.delay(usize::MAX), MAX_BACKOFF);

        let capped = Backoff::default();
        assert_eq!(capped.delay(usize::MAX), DEFAULT_MAX);
    }

    #[test]
    fn with_max_validates_bounds() {
        let err = Backoff::exponential(Duration::from_secs(10))
            .with_max(Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, BackoffError::MaxLessThanBase { .. }));

        let err = Backoff::exponential(Duration::ZERO).with_max(Duration::ZERO).unwrap_err();
        assert_eq!(err, BackoffError::MaxMustBePositive);
    }

    #[test]
    fn zero_base_stays_zero() {
        let backoff = Backoff::exponential(Duration::ZERO);
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(30), Duration::ZERO);
        assert_eq!(backoff.clamp_attempt(), 0);
    }

    #[test]
    fn sub_millisecond_precision_is_kept() {
        let backoff = Backoff::exponential(Duration::from_micros(3));
        assert_eq!(backoff.delay(2), Duration::from_micros(12));
    }
}
