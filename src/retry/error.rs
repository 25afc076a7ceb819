//! Terminal error types for retried operations.

use std::fmt;
use std::time::Duration;

/// Why an operation stopped without succeeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    /// The last error was classified as not retryable.
    Unretryable,
    /// The client's shared retry quota could not pay for another retry.
    QuotaExhausted,
    /// The per-operation attempt ceiling was reached.
    MaxAttemptsExceeded,
    /// The operation was cancelled during a backoff wait.
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unretryable => write!(f, "unretryable error"),
            Self::QuotaExhausted => write!(f, "retry quota exhausted"),
            Self::MaxAttemptsExceeded => write!(f, "max attempts exceeded"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Error returned when an operation ends without success.
///
/// Carries the last transport error along with how and when the loop stopped.
///
/// # Examples
///
/// ```rust
/// use retry_governor::testing::{FakeError, ScriptedTransport};
/// use retry_governor::{RetryConfig, RetryGovernor, TerminationReason, TransportFailure};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let governor = RetryGovernor::new(
///     RetryConfig::default()
///         .with_max_attempts(2)
///         .with_base_delay(Duration::from_millis(1))
///         .with_max_delay(Duration::from_millis(1)),
/// )
/// .unwrap();
///
/// let transport = ScriptedTransport::<(), _>::new(vec![
///     Err(FakeError::transport(TransportFailure::Timeout)),
///     Err(FakeError::transport(TransportFailure::Timeout)),
/// ]);
///
/// let err = governor.run(|| transport.next()).await.unwrap_err();
/// assert_eq!(err.reason, TerminationReason::MaxAttemptsExceeded);
/// assert_eq!(err.attempts, 2);
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    /// Why the loop stopped.
    pub reason: TerminationReason,
    /// The error from the final attempt.
    pub last_error: E,
    /// Total number of attempts made.
    pub attempts: u32,
    /// Time from the first attempt until the loop stopped.
    pub total_duration: Duration,
}

impl<E> RetryError<E> {
    /// Create a new RetryError.
    pub fn new(
        reason: TerminationReason,
        last_error: E,
        attempts: u32,
        total_duration: Duration,
    ) -> Self {
        Self {
            reason,
            last_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the last error, discarding metadata.
    pub fn into_error(self) -> E {
        self.last_error
    }

    /// Get a reference to the last error.
    pub fn error(&self) -> &E {
        &self.last_error
    }

    /// Returns true if the shared quota stopped the retries.
    ///
    /// Callers typically treat this as a signal that the whole client is
    /// under pressure, not just this request.
    pub fn is_quota_exhausted(&self) -> bool {
        self.reason == TerminationReason::QuotaExhausted
    }

    /// Returns true if the attempt ceiling stopped the retries.
    pub fn is_max_attempts_exceeded(&self) -> bool {
        self.reason == TerminationReason::MaxAttemptsExceeded
    }

    /// Returns true if the last error was not retryable.
    pub fn is_unretryable(&self) -> bool {
        self.reason == TerminationReason::Unretryable
    }

    /// Returns true if the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.reason == TerminationReason::Cancelled
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempts ({:?}): {}",
            self.reason, self.attempts, self.total_duration, self.last_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// Error returned when an operation times out.
///
/// Can wrap either a timeout or an inner error from the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutError<E> {
    /// The operation timed out.
    Timeout {
        /// The timeout duration that was exceeded.
        duration: Duration,
    },
    /// An inner error occurred before timeout.
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Get the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Timeout { .. } => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for TimeoutError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { duration } => write!(f, "operation timed out after {:?}", duration),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for TimeoutError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Inner(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_retry_error_display() {
        let err = RetryError::new(
            TerminationReason::QuotaExhausted,
            "connection failed",
            3,
            Duration::from_millis(500),
        );
        let display = format!("{}", err);
        assert!(display.contains("retry quota exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection failed"));
    }

    #[test]
    fn test_retry_error_predicates() {
        let err = RetryError::new(TerminationReason::QuotaExhausted, (), 2, Duration::ZERO);
        assert!(err.is_quota_exhausted());
        assert!(!err.is_max_attempts_exceeded());
        assert!(!err.is_unretryable());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_retry_error_into_error() {
        let err = RetryError::new(
            TerminationReason::Unretryable,
            "test error",
            1,
            Duration::from_secs(1),
        );
        assert_eq!(err.error(), &"test error");
        assert_eq!(err.into_error(), "test error");
    }

    #[test]
    fn test_retry_error_source() {
        use std::error::Error;

        let io = std::io::Error::other("reset");
        let err = RetryError::new(TerminationReason::Cancelled, io, 2, Duration::ZERO);
        assert_eq!(err.source().map(|s| s.to_string()), Some("reset".to_string()));
    }

    #[test]
    fn test_timeout_error() {
        let err: TimeoutError<String> = TimeoutError::Timeout {
            duration: Duration::from_secs(5),
        };
        assert!(err.is_timeout());
        assert!(format!("{}", err).contains("timed out"));
        assert!(err.into_inner().is_none());

        let inner = TimeoutError::Inner("failed".to_string());
        assert!(!inner.is_timeout());
        assert_eq!(format!("{}", inner), "failed");
        assert_eq!(inner.into_inner(), Some("failed".to_string()));
    }
}
