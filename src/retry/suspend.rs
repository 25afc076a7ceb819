//! Cancellable backoff suspension.
//!
//! The attempt loop never sleeps directly; it asks a [`Suspend`]
//! implementation to wait, handing it the operation's [`CancelSignal`]. The
//! production implementation is [`TokioSuspend`]; tests plug in
//! [`RecordingSuspend`](crate::testing::RecordingSuspend) to run without a
//! clock.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;

/// How a suspension ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// The full delay passed.
    Elapsed,
    /// The operation was cancelled during the wait.
    Cancelled,
}

/// A wait that can be interrupted by cancellation.
pub trait Suspend: Debug + Send + Sync {
    /// Wait for `delay`, or until `cancel` fires, whichever comes first.
    fn suspend<'a>(&'a self, delay: Duration, cancel: &'a CancelSignal) -> BoxFuture<'a, Wakeup>;
}

/// Suspends on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSuspend;

impl Suspend for TokioSuspend {
    fn suspend<'a>(&'a self, delay: Duration, cancel: &'a CancelSignal) -> BoxFuture<'a, Wakeup> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Wakeup::Cancelled,
                _ = tokio::time::sleep(delay) => Wakeup::Elapsed,
            }
        })
    }
}

/// Cancellation flag shared between an operation and whoever may cancel it.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
///
/// # Examples
///
/// ```rust
/// use retry_governor::CancelSignal;
///
/// let signal = CancelSignal::new();
/// let handle = signal.clone();
/// assert!(!signal.is_cancelled());
///
/// handle.cancel();
/// assert!(signal.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    /// Create a signal that has not fired.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal, waking every pending suspension.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once the
        // flag is set.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_suspend_elapses() {
        let cancel = CancelSignal::new();
        let start = tokio::time::Instant::now();
        let wakeup = TokioSuspend.suspend(Duration::from_secs(5), &cancel).await;
        assert_eq!(wakeup, Wakeup::Elapsed);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_suspend_cancelled_mid_wait() {
        let cancel = CancelSignal::new();
        let handle = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        let start = tokio::time::Instant::now();
        let wakeup = TokioSuspend.suspend(Duration::from_secs(60), &cancel).await;
        assert_eq!(wakeup, Wakeup::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_cancelled_returns_immediately() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let wakeup = TokioSuspend.suspend(Duration::from_secs(3600), &cancel).await;
        assert_eq!(wakeup, Wakeup::Cancelled);
    }
}
