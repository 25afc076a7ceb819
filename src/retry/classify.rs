//! Classify attempt outcomes into retry kinds.
//!
//! Classification is table driven: an error's machine-readable metadata (error
//! code, HTTP status, transport failure) is looked up in a
//! [`OutcomeClassifier`]. Anything the table does not recognize is
//! [`RetryKind::UnretryableFailure`], so an unknown condition can never cause
//! an unbounded retry loop.

use std::collections::HashMap;
use std::time::Duration;

use super::kind::{RetryKind, RetryableKind};

/// Failure raised below the protocol layer, before any response was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportFailure {
    /// Connect or read timed out.
    Timeout,
    /// Connection refused, reset, DNS failure, TLS negotiation failure.
    Connection,
    /// Any other I/O failure while sending or receiving.
    Io,
}

/// Machine-readable facts about an error, borrowed from the error itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorMetadata<'a> {
    /// Service error code, e.g. `ThrottlingException`.
    pub code: Option<&'a str>,
    /// HTTP status of the response, if one was received.
    pub status: Option<u16>,
    /// Transport level failure, if no response was received.
    pub transport: Option<TransportFailure>,
    /// Delay the server asked for before the next attempt (`Retry-After`).
    ///
    /// Only consulted when the error is otherwise retryable.
    pub retry_after: Option<Duration>,
}

impl<'a> ErrorMetadata<'a> {
    /// Metadata with nothing set; classifies as unretryable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the error code.
    pub fn with_code(mut self, code: &'a str) -> Self {
        self.code = Some(code);
        self
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the transport failure.
    pub fn with_transport(mut self, failure: TransportFailure) -> Self {
        self.transport = Some(failure);
        self
    }

    /// Set the server-supplied retry delay.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }
}

/// Implemented by transport errors so they can be classified.
pub trait ProvideErrorMetadata {
    /// Expose this error's code, status and transport failure.
    fn error_metadata(&self) -> ErrorMetadata<'_>;
}

impl<E: ProvideErrorMetadata + ?Sized> ProvideErrorMetadata for &E {
    fn error_metadata(&self) -> ErrorMetadata<'_> {
        (**self).error_metadata()
    }
}

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];

const TRANSIENT_CODES: &[&str] = &["RequestTimeout", "RequestTimeoutException"];

const THROTTLING_STATUSES: &[u16] = &[429];

const SERVER_ERROR_STATUSES: &[u16] = &[500, 502, 503, 504];

/// Lookup table from error metadata to [`RetryKind`].
///
/// Lookup order is error code, then transport failure, then HTTP status; the
/// first hit wins. A service error code is the most specific signal, so a
/// `400 ThrottlingException` is throttling even though 400 alone is not
/// retryable.
///
/// # Examples
///
/// ```rust
/// use retry_governor::{ErrorMetadata, OutcomeClassifier, RetryKind, RetryableKind};
///
/// let classifier = OutcomeClassifier::standard().with_code("Busy", RetryableKind::Throttling);
///
/// let meta = ErrorMetadata::new().with_code("Busy").with_status(400);
/// assert_eq!(
///     classifier.classify_metadata(&meta),
///     RetryKind::Retryable(RetryableKind::Throttling)
/// );
///
/// let meta = ErrorMetadata::new().with_status(404);
/// assert_eq!(classifier.classify_metadata(&meta), RetryKind::UnretryableFailure);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeClassifier {
    codes: HashMap<String, RetryableKind>,
    statuses: HashMap<u16, RetryableKind>,
    transport: HashMap<TransportFailure, RetryableKind>,
}

impl OutcomeClassifier {
    /// A classifier that retries nothing.
    pub fn empty() -> Self {
        Self {
            codes: HashMap::new(),
            statuses: HashMap::new(),
            transport: HashMap::new(),
        }
    }

    /// The standard table: well-known throttling and timeout codes, 429 as
    /// throttling, 500/502/503/504 as server errors, and every transport
    /// failure as transient.
    pub fn standard() -> Self {
        let mut classifier = Self::empty();
        for code in THROTTLING_CODES {
            classifier = classifier.with_code(*code, RetryableKind::Throttling);
        }
        for code in TRANSIENT_CODES {
            classifier = classifier.with_code(*code, RetryableKind::Transient);
        }
        for status in THROTTLING_STATUSES {
            classifier = classifier.with_status(*status, RetryableKind::Throttling);
        }
        for status in SERVER_ERROR_STATUSES {
            classifier = classifier.with_status(*status, RetryableKind::ServerError);
        }
        classifier
            .with_transport(TransportFailure::Timeout, RetryableKind::Transient)
            .with_transport(TransportFailure::Connection, RetryableKind::Transient)
            .with_transport(TransportFailure::Io, RetryableKind::Transient)
    }

    /// Map an error code to a retryable subtype, replacing any existing entry.
    pub fn with_code(mut self, code: impl Into<String>, kind: RetryableKind) -> Self {
        self.codes.insert(code.into(), kind);
        self
    }

    /// Map an HTTP status to a retryable subtype, replacing any existing entry.
    pub fn with_status(mut self, status: u16, kind: RetryableKind) -> Self {
        self.statuses.insert(status, kind);
        self
    }

    /// Map a transport failure to a retryable subtype.
    pub fn with_transport(mut self, failure: TransportFailure, kind: RetryableKind) -> Self {
        self.transport.insert(failure, kind);
        self
    }

    /// Remove an error code from the table; it becomes unretryable.
    pub fn without_code(mut self, code: &str) -> Self {
        self.codes.remove(code);
        self
    }

    /// Remove an HTTP status from the table; it becomes unretryable.
    pub fn without_status(mut self, status: u16) -> Self {
        self.statuses.remove(&status);
        self
    }

    /// Classify the outcome of one attempt.
    ///
    /// `Ok` is always [`RetryKind::Unnecessary`].
    pub fn classify<T, E>(&self, outcome: &Result<T, E>) -> RetryKind
    where
        E: ProvideErrorMetadata,
    {
        match outcome {
            Ok(_) => RetryKind::Unnecessary,
            Err(error) => self.classify_error(error),
        }
    }

    /// Classify an error.
    pub fn classify_error<E>(&self, error: &E) -> RetryKind
    where
        E: ProvideErrorMetadata + ?Sized,
    {
        self.classify_metadata(&error.error_metadata())
    }

    /// Classify raw error metadata.
    ///
    /// A retryable error carrying `retry_after` becomes
    /// [`RetryKind::Explicit`]; `retry_after` never makes an unretryable error
    /// retryable.
    pub fn classify_metadata(&self, meta: &ErrorMetadata<'_>) -> RetryKind {
        let by_code = meta.code.and_then(|code| self.codes.get(code));
        let by_transport = || meta.transport.and_then(|t| self.transport.get(&t));
        let by_status = || meta.status.and_then(|s| self.statuses.get(&s));

        match (by_code.or_else(by_transport).or_else(by_status), meta.retry_after) {
            (Some(kind), Some(delay)) => RetryKind::Explicit { kind: *kind, delay },
            (Some(kind), None) => RetryKind::Retryable(*kind),
            (None, _) => RetryKind::UnretryableFailure,
        }
    }
}

impl Default for OutcomeClassifier {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(meta: ErrorMetadata<'_>) -> RetryKind {
        OutcomeClassifier::standard().classify_metadata(&meta)
    }

    #[test]
    fn http_429_is_throttling() {
        assert_eq!(
            classify(ErrorMetadata::new().with_status(429)),
            RetryKind::Retryable(RetryableKind::Throttling)
        );
    }

    #[test]
    fn http_5xx_is_server_error() {
        for status in [500, 502, 503, 504] {
            assert_eq!(
                classify(ErrorMetadata::new().with_status(status)),
                RetryKind::Retryable(RetryableKind::ServerError)
            );
        }
    }

    #[test]
    fn http_4xx_and_501_unretryable() {
        for status in [400, 403, 404, 501] {
            assert_eq!(
                classify(ErrorMetadata::new().with_status(status)),
                RetryKind::UnretryableFailure
            );
        }
    }

    #[test]
    fn throttling_code_wins_over_status() {
        let meta = ErrorMetadata::new()
            .with_code("ThrottlingException")
            .with_status(400);
        assert_eq!(
            classify(meta),
            RetryKind::Retryable(RetryableKind::Throttling)
        );
    }

    #[test]
    fn request_timeout_code_is_transient() {
        assert_eq!(
            classify(ErrorMetadata::new().with_code("RequestTimeout")),
            RetryKind::Retryable(RetryableKind::Transient)
        );
    }

    #[test]
    fn transport_failures_are_transient() {
        for failure in [
            TransportFailure::Timeout,
            TransportFailure::Connection,
            TransportFailure::Io,
        ] {
            assert_eq!(
                classify(ErrorMetadata::new().with_transport(failure)),
                RetryKind::Retryable(RetryableKind::Transient)
            );
        }
    }

    #[test]
    fn unknown_code_is_unretryable() {
        assert_eq!(
            classify(ErrorMetadata::new().with_code("AccessDenied")),
            RetryKind::UnretryableFailure
        );
        assert_eq!(classify(ErrorMetadata::new()), RetryKind::UnretryableFailure);
    }

    #[test]
    fn unknown_code_falls_through_to_status() {
        let meta = ErrorMetadata::new().with_code("InternalFailure").with_status(500);
        assert_eq!(
            classify(meta),
            RetryKind::Retryable(RetryableKind::ServerError)
        );
    }

    #[test]
    fn retry_after_makes_retryable_error_explicit() {
        let meta = ErrorMetadata::new()
            .with_status(503)
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(
            classify(meta),
            RetryKind::Explicit {
                kind: RetryableKind::ServerError,
                delay: Duration::from_secs(3),
            }
        );
    }

    #[test]
    fn retry_after_on_unretryable_error_is_ignored() {
        let meta = ErrorMetadata::new()
            .with_status(400)
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(classify(meta), RetryKind::UnretryableFailure);
    }

    #[test]
    fn ok_is_unnecessary() {
        struct Never;
        impl ProvideErrorMetadata for Never {
            fn error_metadata(&self) -> ErrorMetadata<'_> {
                ErrorMetadata::new().with_status(503)
            }
        }
        let outcome: Result<u8, Never> = Ok(1);
        assert_eq!(
            OutcomeClassifier::empty().classify(&outcome),
            RetryKind::Unnecessary
        );
    }

    #[test]
    fn table_entries_can_be_removed() {
        let classifier = OutcomeClassifier::standard()
            .without_status(503)
            .without_code("SlowDown");
        assert_eq!(
            classifier.classify_metadata(&ErrorMetadata::new().with_status(503)),
            RetryKind::UnretryableFailure
        );
        assert_eq!(
            classifier.classify_metadata(&ErrorMetadata::new().with_code("SlowDown")),
            RetryKind::UnretryableFailure
        );
    }

    #[test]
    fn empty_table_retries_nothing() {
        let meta = ErrorMetadata::new()
            .with_status(503)
            .with_transport(TransportFailure::Timeout);
        assert_eq!(
            OutcomeClassifier::empty().classify_metadata(&meta),
            RetryKind::UnretryableFailure
        );
    }
}
