//! Testing utilities for code built on the retry governor.
//!
//! Everything here runs without a clock: [`RecordingSuspend`] completes every
//! backoff wait immediately and remembers the delays it was asked for, and
//! [`ScriptedTransport`] replays a fixed list of outcomes.
//!
//! # Examples
//!
//! ```rust
//! use retry_governor::testing::{FakeError, RecordingSuspend, ScriptedTransport};
//! use retry_governor::{assert_terminated, RetryConfig, RetryGovernor, TerminationReason};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let suspend = Arc::new(RecordingSuspend::new());
//! let governor = RetryGovernor::builder(RetryConfig::default())
//!     .suspend(suspend.clone())
//!     .build()
//!     .unwrap();
//!
//! let transport = ScriptedTransport::<(), _>::new(vec![Err(FakeError::status(503))]);
//! let result = governor.run(|| transport.next()).await;
//!
//! assert_terminated!(result, TerminationReason::MaxAttemptsExceeded);
//! assert_eq!(suspend.delays().len(), 2);
//! # });
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{self, BoxFuture, Ready};

use crate::retry::{
    CancelSignal, ErrorMetadata, ProvideErrorMetadata, Suspend, TransportFailure, Wakeup,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A [`Suspend`] that returns immediately and records requested delays.
///
/// Honours cancellation: a signal that has already fired yields
/// [`Wakeup::Cancelled`]. [`cancel_on`](Self::cancel_on) simulates a
/// cancellation arriving in the middle of a particular wait.
#[derive(Debug, Default)]
pub struct RecordingSuspend {
    delays: Mutex<Vec<Duration>>,
    calls: AtomicUsize,
    cancel_on: Option<usize>,
}

impl RecordingSuspend {
    /// Create a suspender that never cancels on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the operation's cancel signal during the `n`th wait (1-based).
    pub fn cancel_on(mut self, n: usize) -> Self {
        self.cancel_on = Some(n);
        self
    }

    /// Delays of every wait that ran to completion, in order.
    pub fn delays(&self) -> Vec<Duration> {
        lock(&self.delays).clone()
    }

    /// Number of waits requested, including cancelled ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Suspend for RecordingSuspend {
    fn suspend<'a>(&'a self, delay: Duration, cancel: &'a CancelSignal) -> BoxFuture<'a, Wakeup> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_on == Some(call) {
            cancel.cancel();
        }
        let wakeup = if cancel.is_cancelled() {
            Wakeup::Cancelled
        } else {
            lock(&self.delays).push(delay);
            Wakeup::Elapsed
        };
        Box::pin(future::ready(wakeup))
    }
}

/// A transport error with settable metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeError {
    /// Service error code.
    pub code: Option<String>,
    /// HTTP status.
    pub status: Option<u16>,
    /// Transport failure.
    pub transport: Option<TransportFailure>,
    /// Server-supplied retry delay.
    pub retry_after: Option<Duration>,
}

impl FakeError {
    /// An error carrying only a service error code.
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// An error carrying only an HTTP status.
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A transport failure with no response.
    pub fn transport(failure: TransportFailure) -> Self {
        Self {
            transport: Some(failure),
            ..Self::default()
        }
    }

    /// Attach a server-supplied retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.status, self.transport) {
            (Some(code), Some(status), _) => write!(f, "{} (HTTP {})", code, status),
            (Some(code), None, _) => write!(f, "{}", code),
            (None, Some(status), _) => write!(f, "HTTP {}", status),
            (None, None, Some(failure)) => write!(f, "transport failure: {:?}", failure),
            (None, None, None) => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for FakeError {}

impl ProvideErrorMetadata for FakeError {
    fn error_metadata(&self) -> ErrorMetadata<'_> {
        ErrorMetadata {
            code: self.code.as_deref(),
            status: self.status,
            transport: self.transport,
            retry_after: self.retry_after,
        }
    }
}

/// Replays a fixed script of attempt outcomes.
///
/// Each call to [`next`](Self::next) consumes one outcome; once the script
/// runs out, the final outcome repeats.
#[derive(Debug)]
pub struct ScriptedTransport<T, E> {
    script: Mutex<VecDeque<Result<T, E>>>,
    last: Result<T, E>,
    attempts: AtomicU32,
}

impl<T: Clone, E: Clone> ScriptedTransport<T, E> {
    /// Create a transport from a script of outcomes.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    pub fn new(script: Vec<Result<T, E>>) -> Self {
        let last = match script.last() {
            Some(last) => last.clone(),
            None => panic!("ScriptedTransport needs at least one outcome"),
        };
        Self {
            script: Mutex::new(script.into()),
            last,
            attempts: AtomicU32::new(0),
        }
    }

    /// Produce the next outcome.
    pub fn next(&self) -> Ready<Result<T, E>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.last.clone());
        future::ready(outcome)
    }

    /// Number of attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

/// Assert that a retried operation ended with the given termination reason.
///
/// # Example
///
/// ```rust
/// use retry_governor::{assert_terminated, RetryError, TerminationReason};
/// use std::time::Duration;
///
/// let result: Result<(), _> = Err(RetryError::new(
///     TerminationReason::QuotaExhausted,
///     "HTTP 503",
///     2,
///     Duration::ZERO,
/// ));
/// assert_terminated!(result, TerminationReason::QuotaExhausted);
/// ```
#[macro_export]
macro_rules! assert_terminated {
    ($result:expr, $reason:expr) => {
        match $result {
            Err(err) => {
                let err: $crate::RetryError<_> = err;
                assert_eq!(err.reason, $reason, "unexpected termination: {:?}", err.reason);
            }
            Ok(v) => {
                panic!("Expected termination with {:?}, got Ok: {:?}", $reason, v);
            }
        }
    };
}
