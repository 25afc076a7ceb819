//! Classification of a single attempt outcome.

use std::fmt;
use std::time::Duration;

/// How the outcome of one attempt bears on retrying.
///
/// This is the only thing the attempt loop looks at when deciding what to do
/// next; the raw error stays opaque to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryKind {
    /// The attempt succeeded; no retry needed.
    Unnecessary,
    /// The error must not be retried.
    UnretryableFailure,
    /// The error may be retried.
    Retryable(RetryableKind),
    /// The error may be retried after a delay the server asked for.
    ///
    /// The delay replaces the jittered backoff for this retry; the debit
    /// cost still comes from `kind`.
    Explicit {
        /// Subtype used to pick the debit cost.
        kind: RetryableKind,
        /// Server-supplied wait, e.g. from `Retry-After`.
        delay: Duration,
    },
}

/// Why a failed attempt may be retried.
///
/// Used to pick the quota debit cost for the retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RetryableKind {
    /// The server explicitly asked the client to back off (e.g. 429).
    Throttling,
    /// Connection level failure or timeout.
    ///
    /// Typically these should never be retried for non-idempotent requests,
    /// since the server may already have applied the request.
    Transient,
    /// Server error that is not throttling but is worth another try (5xx).
    ServerError,
}

impl RetryKind {
    /// Returns true if the attempt succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryKind::Unnecessary)
    }

    /// Server-supplied retry delay, if any.
    pub fn explicit_delay(&self) -> Option<Duration> {
        match self {
            RetryKind::Explicit { delay, .. } => Some(*delay),
            _ => None,
        }
    }

    /// Returns the retryable subtype, if any.
    pub fn retryable(&self) -> Option<RetryableKind> {
        match self {
            RetryKind::Retryable(kind) | RetryKind::Explicit { kind, .. } => Some(*kind),
            RetryKind::Unnecessary | RetryKind::UnretryableFailure => None,
        }
    }
}

impl fmt::Display for RetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryKind::Unnecessary => write!(f, "success"),
            RetryKind::UnretryableFailure => write!(f, "unretryable failure"),
            RetryKind::Retryable(kind) => write!(f, "retryable ({})", kind),
            RetryKind::Explicit { kind, delay } => {
                write!(f, "retryable ({}) after {:?}", kind, delay)
            }
        }
    }
}

impl fmt::Display for RetryableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryableKind::Throttling => write!(f, "throttling"),
            RetryableKind::Transient => write!(f, "transient"),
            RetryableKind::ServerError => write!(f, "server error"),
        }
    }
}
