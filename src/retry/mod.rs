//! Retry governance for network clients.
//!
//! Four pieces, leaves first:
//!
//! - **Classification**: [`OutcomeClassifier`] turns an attempt's result into a
//!   [`RetryKind`] by table lookup. Unknown errors are never retried.
//! - **Quota**: [`RetryQuota`] is the client-wide token balance every retry
//!   must pay into and every success reimburses.
//! - **Backoff**: [`Backoff`] computes a capped exponential envelope and draws
//!   a fully jittered delay from it.
//! - **Attempt loop**: [`AttemptLoop`] ties them together for one operation;
//!   [`RetryGovernor`] owns the shared pieces for a whole client.
//!
//! # Quick Start
//!
//! ```rust
//! use retry_governor::testing::{FakeError, ScriptedTransport};
//! use retry_governor::{RetryConfig, RetryGovernor};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let governor = RetryGovernor::new(
//!     RetryConfig::default()
//!         .with_base_delay(Duration::from_millis(1))
//!         .with_max_delay(Duration::from_millis(5)),
//! )
//! .unwrap();
//!
//! let transport = ScriptedTransport::new(vec![
//!     Err(FakeError::code("ThrottlingException")),
//!     Ok(42),
//! ]);
//!
//! assert_eq!(governor.run(|| transport.next()).await.unwrap(), 42);
//! # });
//! ```
//!
//! # Reimbursement
//!
//! Every successful operation reimburses the quota, including operations that
//! never retried. Reimbursing only after a retried success lets ordinary
//! traffic drain the balance to zero over time, after which the client never
//! retries again.
//!
//! # Error Types
//!
//! - [`RetryError`]: returned when an operation stops without success; its
//!   [`TerminationReason`] tells quota exhaustion apart from ordinary failure
//! - [`TimeoutError`]: returned by
//!   [`RetryGovernor::run_with_timeout`] when the deadline passes

mod attempt;
mod backoff;
mod classify;
mod config;
mod error;
mod governor;
mod kind;
mod quota;
mod suspend;

pub use attempt::{AttemptHook, AttemptLoop, AttemptRecord, RetryDecision};
pub use backoff::{Backoff, JitterStrategy};
pub use classify::{ErrorMetadata, OutcomeClassifier, ProvideErrorMetadata, TransportFailure};
pub use config::{ConfigError, RetryConfig, RetryCosts};
pub use error::{RetryError, TerminationReason, TimeoutError};
pub use governor::{RetryGovernor, RetryGovernorBuilder};
pub use kind::{RetryKind, RetryableKind};
pub use quota::RetryQuota;
pub use suspend::{CancelSignal, Suspend, TokioSuspend, Wakeup};
