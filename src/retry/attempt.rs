//! The per-operation attempt loop.
//!
//! One [`AttemptLoop`] drives one logical operation:
//!
//! ```text
//! Attempting -> Classifying -> Done(success)
//!                           -> Done(unretryable)
//!                           -> Done(max attempts exceeded)
//!                           -> QuotaCheck -> Done(quota exhausted)
//!                                         -> BackoffWait -> Attempting
//!                                                        -> Done(cancelled)
//! ```
//!
//! The loop's only side effects are quota debits and reimbursements, the
//! backoff suspension, and the optional per-attempt hook.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use super::backoff::Backoff;
use super::classify::{OutcomeClassifier, ProvideErrorMetadata};
use super::config::RetryConfig;
use super::error::{RetryError, TerminationReason};
use super::kind::RetryKind;
use super::quota::RetryQuota;
use super::suspend::{CancelSignal, Suspend, Wakeup};

/// Observer invoked once per classified attempt.
pub type AttemptHook = Arc<dyn Fn(&AttemptRecord) + Send + Sync>;

/// What happened on one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Which attempt this was (1-indexed).
    pub attempt: u32,
    /// Backoff waited before this attempt; zero for the first.
    pub backoff: Duration,
    /// How the attempt's outcome was classified.
    pub kind: RetryKind,
}

/// What the loop does after classifying an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt succeeded and the quota has been reimbursed.
    Succeeded,
    /// A retry has been paid for; wait `delay` and try again.
    Retry {
        /// Jittered backoff before the next attempt.
        delay: Duration,
    },
    /// Stop with the last error.
    Stop(TerminationReason),
}

impl RetryDecision {
    /// Returns true if another attempt should be made.
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }

    /// Delay before the next attempt, if retrying.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::Retry { delay } => Some(*delay),
            RetryDecision::Succeeded | RetryDecision::Stop(_) => None,
        }
    }

    /// Why the loop stopped, if it stopped without success.
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self {
            RetryDecision::Stop(reason) => Some(*reason),
            RetryDecision::Succeeded | RetryDecision::Retry { .. } => None,
        }
    }
}

/// State of one operation's retry loop.
///
/// Borrows the client's shared pieces; owns only the attempt counter and the
/// timing of the current operation.
pub struct AttemptLoop<'a> {
    quota: &'a RetryQuota,
    classifier: &'a OutcomeClassifier,
    suspend: &'a dyn Suspend,
    hook: Option<&'a AttemptHook>,
    config: &'a RetryConfig,
    backoff: Backoff,
    attempt: u32,
    backoff_before: Duration,
    start: Instant,
}

impl std::fmt::Debug for AttemptLoop<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLoop")
            .field("attempt", &self.attempt)
            .field("backoff_before", &self.backoff_before)
            .field("available", &self.quota.available())
            .finish_non_exhaustive()
    }
}

impl<'a> AttemptLoop<'a> {
    /// Start a loop at attempt 1.
    pub fn new(
        quota: &'a RetryQuota,
        classifier: &'a OutcomeClassifier,
        suspend: &'a dyn Suspend,
        config: &'a RetryConfig,
    ) -> Self {
        Self {
            quota,
            classifier,
            suspend,
            hook: None,
            config,
            backoff: config.backoff(),
            attempt: 1,
            backoff_before: Duration::ZERO,
            start: Instant::now(),
        }
    }

    /// Attach a per-attempt observer.
    pub fn with_hook(mut self, hook: Option<&'a AttemptHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Index of the current attempt (1-based).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Decide what follows an attempt classified as `kind`.
    ///
    /// This is where the quota is touched: success reimburses it
    /// unconditionally, and a retry is only granted once its cost has been
    /// debited. Unretryable failures and the attempt ceiling leave it alone.
    /// An [`Explicit`](RetryKind::Explicit) delay is used as is, capped at
    /// the backoff maximum.
    pub fn decide<R>(&mut self, kind: RetryKind, rng: &mut R) -> RetryDecision
    where
        R: Rng + ?Sized,
    {
        let (subtype, explicit) = match kind {
            RetryKind::Unnecessary => {
                self.quota.reimburse(self.config.reimbursement);
                log_event!(
                    trace,
                    attempt = self.attempt,
                    reimbursed = self.config.reimbursement,
                    available = self.quota.available(),
                    "quota reimbursed"
                );
                return RetryDecision::Succeeded;
            }
            RetryKind::UnretryableFailure => {
                return RetryDecision::Stop(TerminationReason::Unretryable);
            }
            RetryKind::Retryable(subtype) => (subtype, None),
            RetryKind::Explicit {
                kind: subtype,
                delay,
            } => (subtype, Some(delay)),
        };

        if self.attempt >= self.config.max_attempts {
            log_event!(
                debug,
                attempt = self.attempt,
                max_attempts = self.config.max_attempts,
                "max attempts exceeded"
            );
            return RetryDecision::Stop(TerminationReason::MaxAttemptsExceeded);
        }

        let cost = self.config.costs.cost_for(subtype);
        if !self.quota.try_debit(cost) {
            log_event!(
                warn,
                attempt = self.attempt,
                cost,
                available = self.quota.available(),
                "retry quota exhausted"
            );
            return RetryDecision::Stop(TerminationReason::QuotaExhausted);
        }

        // A server-supplied delay skips jitter but is still capped.
        let delay = match explicit {
            Some(delay) => delay.min(self.backoff.max()),
            None => self.backoff.delay(self.attempt, rng),
        };
        log_event!(
            debug,
            attempt = self.attempt,
            %subtype,
            cost,
            available = self.quota.available(),
            ?delay,
            "retry scheduled"
        );
        RetryDecision::Retry { delay }
    }

    /// Run the operation to a terminal outcome.
    ///
    /// `op` is invoked once per attempt and must build a fresh request each
    /// time. If `cancel` fires during a backoff wait the loop returns at once
    /// with [`TerminationReason::Cancelled`]; tokens already debited are not
    /// refunded and nothing is reimbursed. A retryable failure seen after
    /// `cancel` has fired stops with the same reason without debiting.
    pub async fn run<T, E, F, Fut, R>(
        mut self,
        mut op: F,
        cancel: &CancelSignal,
        rng: &mut R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProvideErrorMetadata,
        R: Rng + ?Sized,
    {
        loop {
            let outcome = op().await;
            let kind = self.classifier.classify(&outcome);
            self.observe(kind);

            let error = match outcome {
                Ok(value) => {
                    self.decide(kind, rng);
                    return Ok(value);
                }
                Err(error) => error,
            };

            // Don't pay for a retry that could never be waited out.
            if kind.retryable().is_some() && cancel.is_cancelled() {
                log_event!(debug, attempt = self.attempt, "cancelled before retry");
                return Err(self.stop(TerminationReason::Cancelled, error));
            }

            let delay = match self.decide(kind, rng) {
                RetryDecision::Retry { delay } => delay,
                RetryDecision::Stop(reason) => return Err(self.stop(reason, error)),
                // Errors never classify as success.
                RetryDecision::Succeeded => {
                    return Err(self.stop(TerminationReason::Unretryable, error))
                }
            };

            match self.suspend.suspend(delay, cancel).await {
                Wakeup::Elapsed => {
                    self.attempt += 1;
                    self.backoff_before = delay;
                }
                Wakeup::Cancelled => {
                    log_event!(debug, attempt = self.attempt, "cancelled during backoff");
                    return Err(self.stop(TerminationReason::Cancelled, error));
                }
            }
        }
    }

    fn observe(&self, kind: RetryKind) {
        log_event!(debug, attempt = self.attempt, %kind, "attempt classified");
        if let Some(hook) = self.hook {
            hook(&AttemptRecord {
                attempt: self.attempt,
                backoff: self.backoff_before,
                kind,
            });
        }
    }

    fn stop<E>(&self, reason: TerminationReason, error: E) -> RetryError<E> {
        RetryError::new(reason, error, self.attempt, self.start.elapsed())
    }
}
