//! Exponential backoff delays.

use std::time::Duration;

use rand::Rng;

/// Hard ceiling on the delay, as a multiple of the base period.
const CEILING_MULTIPLIER: u32 = 100;

/// Largest exponent applied before the delay saturates.
const MAX_EXPONENT: u32 = 31;

/// Exponential backoff with a cap and optional jitter.
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(base * 2^(n - 1), min(max, base * 100)) + jitter
/// ```
///
/// where `n` is the number of failed attempts so far (1 for the first retry).
/// The result never exceeds the ceiling, jitter included. Without jitter the
/// sequence is monotonically non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: Duration,
}

impl Backoff {
    /// Creates a backoff without jitter.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: Duration::ZERO,
        }
    }

    /// Adds up to `jitter` of random delay to every computed delay.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// The base period.
    #[must_use]
    pub fn base(&self) -> Duration {
        self.base
    }

    /// The configured maximum period.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// The effective upper bound for any delay.
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        self.max.min(self.base.saturating_mul(CEILING_MULTIPLIER))
    }

    /// Delay before the retry that follows the `failures`-th failed attempt.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(MAX_EXPONENT);
        let ceiling = self.ceiling();
        let delay = self.base.saturating_mul(1_u32 << exponent).min(ceiling);
        (delay + self.sample_jitter()).min(ceiling)
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_ms))
    }
}
