//! # retry-governor
//!
//! Retry control for network clients: decide whether a failed request is
//! worth another attempt, cap how much retrying a whole client may do, and
//! space retries out with jittered exponential backoff.
//!
//! ## Quick Example
//!
//! ```rust
//! use retry_governor::testing::{FakeError, ScriptedTransport};
//! use retry_governor::{RetryConfig, RetryGovernor, TransportFailure};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! // One governor per client; every request shares its retry quota.
//! let governor = RetryGovernor::new(
//!     RetryConfig::default()
//!         .with_capacity(100)
//!         .with_base_delay(Duration::from_millis(1))
//!         .with_max_delay(Duration::from_millis(5)),
//! )
//! .unwrap();
//!
//! let transport = ScriptedTransport::new(vec![
//!     Err(FakeError::transport(TransportFailure::Connection)),
//!     Ok("payload"),
//! ]);
//!
//! match governor.run(|| transport.next()).await {
//!     Ok(payload) => println!("got {}", payload),
//!     Err(e) if e.is_quota_exhausted() => println!("client is overloaded: {}", e),
//!     Err(e) => println!("request failed: {}", e),
//! }
//! # });
//! ```
//!
//! ## Features
//!
//! - `tracing`: emit `tracing` events for classification, backoff and quota
//!   decisions, inside a `retry_operation` span per operation
//! - `serde`: `Serialize`/`Deserialize` for [`RetryConfig`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

/// Emit a `tracing` event when the `tracing` feature is enabled.
macro_rules! log_event {
    ($level:ident, $($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::$level!($($arg)*);
    };
}

pub mod retry;
pub mod testing;

// Re-exports
pub use retry::{
    AttemptHook, AttemptLoop, AttemptRecord, Backoff, CancelSignal, ConfigError, ErrorMetadata,
    JitterStrategy, OutcomeClassifier, ProvideErrorMetadata, RetryConfig, RetryCosts,
    RetryDecision, RetryError, RetryGovernor, RetryGovernorBuilder, RetryKind, RetryQuota,
    RetryableKind, Suspend, TerminationReason, TimeoutError, TokioSuspend, TransportFailure,
    Wakeup,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{
        CancelSignal, OutcomeClassifier, ProvideErrorMetadata, RetryConfig, RetryError,
        RetryGovernor, RetryKind, RetryableKind, TerminationReason,
    };
}
