//! Shared retry quota.
//!
//! One [`RetryQuota`] belongs to one client and is shared by every operation
//! that client issues. Each retry must first debit tokens from it; every
//! successful operation reimburses tokens to it. When the balance runs dry the
//! client stops retrying until successes refill it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Token balance capping total retry pressure across a client.
///
/// Both mutations are single compare-and-swap updates on one atomic, so any
/// number of tasks can call them concurrently without losing an update.
///
/// # Examples
///
/// ```rust
/// use retry_governor::RetryQuota;
///
/// let quota = RetryQuota::new(10);
/// assert!(quota.try_debit(5));
/// assert!(quota.try_debit(5));
/// assert!(!quota.try_debit(5));
/// assert_eq!(quota.available(), 0);
///
/// quota.reimburse(100);
/// assert_eq!(quota.available(), 10); // clamped at capacity
/// ```
#[derive(Debug)]
pub struct RetryQuota {
    capacity: u64,
    available: AtomicU64,
}

impl RetryQuota {
    /// Create a full quota.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            available: AtomicU64::new(capacity),
        }
    }

    /// Maximum balance, fixed at construction.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Current balance. Only a snapshot under concurrent use.
    pub fn available(&self) -> u64 {
        self.available.load(Ordering::Acquire)
    }

    /// Take `cost` tokens if at least that many are available.
    ///
    /// Returns false and leaves the balance untouched otherwise.
    pub fn try_debit(&self, cost: u64) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |available| {
                available.checked_sub(cost)
            })
            .is_ok()
    }

    /// Return `amount` tokens, clamped at capacity.
    ///
    /// Called on every successful operation, whether or not it retried; on a
    /// full quota this is a no-op.
    pub fn reimburse(&self, amount: u64) {
        let capacity = self.capacity;
        // The closure always returns Some, so this cannot fail.
        let _ = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |available| {
                Some(available.saturating_add(amount).min(capacity))
            });
    }
}
