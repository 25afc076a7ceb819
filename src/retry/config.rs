//! Retry governor configuration.

use std::fmt;
use std::time::Duration;

use super::backoff::{Backoff, JitterStrategy};
use super::kind::RetryableKind;

/// Quota tokens debited per retry, by retryable subtype.
///
/// Defaults to the same cost for every subtype; services that want to retry
/// throttling more sparingly than timeouts can raise one cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryCosts {
    /// Cost of retrying a throttling error.
    pub throttling: u64,
    /// Cost of retrying a transient (connection or timeout) error.
    pub transient: u64,
    /// Cost of retrying a server error.
    pub server_error: u64,
}

impl RetryCosts {
    /// The same cost for every subtype.
    pub fn uniform(cost: u64) -> Self {
        Self {
            throttling: cost,
            transient: cost,
            server_error: cost,
        }
    }

    /// Cost of one retry of the given subtype.
    pub fn cost_for(&self, kind: RetryableKind) -> u64 {
        match kind {
            RetryableKind::Throttling => self.throttling,
            RetryableKind::Transient => self.transient,
            RetryableKind::ServerError => self.server_error,
        }
    }

    fn max(&self) -> u64 {
        self.throttling.max(self.transient).max(self.server_error)
    }
}

impl Default for RetryCosts {
    fn default() -> Self {
        Self::uniform(RetryConfig::DEFAULT_RETRY_COST)
    }
}

/// Everything a [`RetryGovernor`](crate::RetryGovernor) needs at construction.
///
/// # Examples
///
/// ```rust
/// use retry_governor::{RetryConfig, RetryCosts};
/// use std::time::Duration;
///
/// let config = RetryConfig::default()
///     .with_capacity(100)
///     .with_costs(RetryCosts { throttling: 10, transient: 5, server_error: 5 })
///     .with_max_attempts(4)
///     .with_max_delay(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Quota capacity; the quota starts full.
    pub capacity: u64,
    /// Tokens debited per retry.
    pub costs: RetryCosts,
    /// Tokens returned on every successful operation.
    pub reimbursement: u64,
    /// Delay envelope before the first retry.
    #[cfg_attr(feature = "serde", serde(rename = "base_delay_ms", with = "duration_ms"))]
    pub base_delay: Duration,
    /// Envelope growth per failed attempt.
    pub multiplier: f64,
    /// Upper bound of the delay envelope.
    #[cfg_attr(feature = "serde", serde(rename = "max_delay_ms", with = "duration_ms"))]
    pub max_delay: Duration,
    /// Jitter applied within the envelope.
    pub jitter: JitterStrategy,
    /// Maximum number of attempts per operation, including the first.
    pub max_attempts: u32,
}

impl RetryConfig {
    /// Default quota capacity.
    pub const DEFAULT_CAPACITY: u64 = 500;
    /// Default cost of a retry, for every subtype.
    pub const DEFAULT_RETRY_COST: u64 = 5;
    /// Default reimbursement on success. Equal to the retry cost, so an
    /// operation that retries once and then succeeds leaves the balance
    /// where it found it.
    pub const DEFAULT_REIMBURSEMENT: u64 = 5;
    /// Default maximum attempts, including the first.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// Set the quota capacity.
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set per-subtype retry costs.
    pub fn with_costs(mut self, costs: RetryCosts) -> Self {
        self.costs = costs;
        self
    }

    /// Set the reimbursement on success.
    pub fn with_reimbursement(mut self, amount: u64) -> Self {
        self.reimbursement = amount;
        self
    }

    /// Set the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter strategy.
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the maximum number of attempts, including the first.
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// The backoff calculator described by this configuration.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base_delay, self.multiplier, self.max_delay).with_jitter(self.jitter)
    }

    /// Check the configuration for values that would make the governor
    /// useless or unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::BaseExceedsMax {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        let cost = self.costs.max();
        if cost > self.capacity {
            return Err(ConfigError::CostExceedsCapacity {
                cost,
                capacity: self.capacity,
            });
        }
        if self.reimbursement == 0 {
            return Err(ConfigError::ZeroReimbursement);
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            costs: RetryCosts::default(),
            reimbursement: Self::DEFAULT_REIMBURSEMENT,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(20),
            jitter: JitterStrategy::Full,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Why a [`RetryConfig`] was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A zero-capacity quota can never permit a retry.
    ZeroCapacity,
    /// At least one attempt is required.
    ZeroMaxAttempts,
    /// Multiplier must be finite and at least 1.
    InvalidMultiplier(f64),
    /// Base delay is larger than the cap.
    BaseExceedsMax {
        /// Configured base delay.
        base: Duration,
        /// Configured maximum delay.
        max: Duration,
    },
    /// A retry would cost more than the whole quota.
    CostExceedsCapacity {
        /// Largest configured retry cost.
        cost: u64,
        /// Configured capacity.
        capacity: u64,
    },
    /// Without reimbursement the quota drains permanently.
    ZeroReimbursement,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "quota capacity must be greater than zero"),
            Self::ZeroMaxAttempts => write!(f, "max_attempts must be at least 1"),
            Self::InvalidMultiplier(m) => {
                write!(f, "backoff multiplier must be finite and >= 1, got {}", m)
            }
            Self::BaseExceedsMax { base, max } => {
                write!(f, "base delay {:?} exceeds max delay {:?}", base, max)
            }
            Self::CostExceedsCapacity { cost, capacity } => {
                write!(f, "retry cost {} exceeds quota capacity {}", cost, capacity)
            }
            Self::ZeroReimbursement => write!(f, "reimbursement must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "serde")]
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
