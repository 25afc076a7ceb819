//! Backoff delay calculation.

use std::time::Duration;

use rand::Rng;

/// Capped exponential backoff with optional full jitter.
///
/// Backoff is pure data: the delay depends only on the attempt index, the
/// configured envelope and the random source handed in by the caller.
///
/// # Examples
///
/// ```rust
/// use retry_governor::{Backoff, JitterStrategy};
/// use std::time::Duration;
///
/// let backoff = Backoff::new(Duration::from_millis(100), 2.0, Duration::from_secs(1));
///
/// // Envelope doubles per failed attempt: 100ms, 200ms, 400ms, 800ms, 1s (capped)
/// assert_eq!(backoff.capped_delay(1), Duration::from_millis(100));
/// assert_eq!(backoff.capped_delay(3), Duration::from_millis(400));
/// assert_eq!(backoff.capped_delay(5), Duration::from_secs(1));
///
/// // Full jitter draws uniformly from [0, envelope]
/// let mut rng = rand::rng();
/// assert!(backoff.delay(3, &mut rng) <= Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    base: Duration,
    multiplier: f64,
    max: Duration,
    jitter: JitterStrategy,
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum JitterStrategy {
    /// No jitter; the delay is the capped envelope.
    None,
    /// Random delay between 0 and the capped envelope.
    #[default]
    Full,
}

impl Backoff {
    /// Create a backoff with full jitter.
    ///
    /// A multiplier below 1 (or not finite) is treated as 1.
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            base,
            multiplier,
            max,
            jitter: JitterStrategy::Full,
        }
    }

    /// Replace the jitter strategy.
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the first retry, before jitter.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Growth factor per failed attempt.
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Upper bound of the envelope.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Get the jitter strategy.
    pub fn jitter(&self) -> JitterStrategy {
        self.jitter
    }

    /// The envelope for the retry after failed attempt `attempt` (1-based):
    /// `min(base * multiplier^(attempt - 1), max)`.
    pub fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        match Duration::try_from_secs_f64(secs) {
            Ok(delay) => delay.min(self.max),
            // Overflowed past anything representable.
            Err(_) => self.max,
        }
    }

    /// The actual delay for the retry after failed attempt `attempt`, with
    /// jitter drawn from `rng`.
    pub fn delay<R>(&self, attempt: u32, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let capped = self.capped_delay(attempt);
        self.jitter.apply(capped, rng)
    }
}

impl JitterStrategy {
    /// Apply jitter to a capped delay.
    pub fn apply<R>(&self, capped: Duration, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        match self {
            JitterStrategy::None => capped,
            JitterStrategy::Full => {
                let max_nanos = u64::try_from(capped.as_nanos()).unwrap_or(u64::MAX);
                if max_nanos == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_nanos(rng.random_range(0..=max_nanos))
                }
            }
        }
    }
}
