//! Per-client retry governor.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::attempt::{AttemptHook, AttemptLoop, AttemptRecord};
use super::classify::{OutcomeClassifier, ProvideErrorMetadata};
use super::config::{ConfigError, RetryConfig};
use super::error::{RetryError, TimeoutError};
use super::quota::RetryQuota;
use super::suspend::{CancelSignal, Suspend, TokioSuspend};

/// Retry control for one client.
///
/// A governor owns the client's single [`RetryQuota`] and hands it to every
/// operation it runs, so all of the client's in-flight operations draw on
/// the same budget. Cloning a governor is cheap and shares that quota;
/// construct a new governor to get an independent one.
///
/// # Examples
///
/// ```rust
/// use retry_governor::testing::{FakeError, ScriptedTransport};
/// use retry_governor::{RetryConfig, RetryGovernor};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let governor = RetryGovernor::new(
///     RetryConfig::default()
///         .with_base_delay(Duration::from_millis(1))
///         .with_max_delay(Duration::from_millis(10)),
/// )
/// .unwrap();
///
/// let transport = ScriptedTransport::new(vec![Err(FakeError::status(503)), Ok("body")]);
/// let body = governor.run(|| transport.next()).await.unwrap();
///
/// assert_eq!(body, "body");
/// assert_eq!(transport.attempts(), 2);
/// // One retry debited 5, the success reimbursed 5.
/// assert_eq!(governor.quota().available(), 500);
/// # });
/// ```
#[derive(Clone)]
pub struct RetryGovernor {
    inner: Arc<Inner>,
}

struct Inner {
    config: RetryConfig,
    classifier: OutcomeClassifier,
    quota: Arc<RetryQuota>,
    suspend: Arc<dyn Suspend>,
    hook: Option<AttemptHook>,
}

impl fmt::Debug for RetryGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryGovernor")
            .field("config", &self.inner.config)
            .field("quota", &self.inner.quota)
            .field("suspend", &self.inner.suspend)
            .field("hook", &self.inner.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl RetryGovernor {
    /// Governor with the standard classifier and tokio timers.
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Start building a governor with custom collaborators.
    pub fn builder(config: RetryConfig) -> RetryGovernorBuilder {
        RetryGovernorBuilder {
            config,
            classifier: OutcomeClassifier::standard(),
            suspend: Arc::new(TokioSuspend),
            hook: None,
        }
    }

    /// The client's shared quota.
    pub fn quota(&self) -> &Arc<RetryQuota> {
        &self.inner.quota
    }

    /// The configuration this governor was built from.
    pub fn config(&self) -> &RetryConfig {
        &self.inner.config
    }

    /// The classification table.
    pub fn classifier(&self) -> &OutcomeClassifier {
        &self.inner.classifier
    }

    /// Run an operation until it succeeds or the governor stops it.
    ///
    /// `op` is called once per attempt. Jitter comes from a generator seeded
    /// from the thread-local RNG.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProvideErrorMetadata,
    {
        self.run_cancellable(op, &CancelSignal::new()).await
    }

    /// Like [`run`](Self::run), but stops with
    /// [`TerminationReason::Cancelled`](crate::TerminationReason::Cancelled)
    /// if `cancel` fires during a backoff wait.
    pub async fn run_cancellable<T, E, F, Fut>(
        &self,
        op: F,
        cancel: &CancelSignal,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProvideErrorMetadata,
    {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        self.run_with_rng(op, cancel, &mut rng).await
    }

    /// Run with a caller-supplied jitter source.
    pub async fn run_with_rng<T, E, F, Fut, R>(
        &self,
        op: F,
        cancel: &CancelSignal,
        rng: &mut R,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProvideErrorMetadata,
        R: Rng + ?Sized,
    {
        let inner = &*self.inner;
        let attempt_loop = AttemptLoop::new(
            &inner.quota,
            &inner.classifier,
            inner.suspend.as_ref(),
            &inner.config,
        )
        .with_hook(inner.hook.as_ref());

        let fut = attempt_loop.run(op, cancel, rng);
        #[cfg(feature = "tracing")]
        let fut = tracing::Instrument::instrument(fut, tracing::debug_span!("retry_operation"));
        fut.await
    }

    /// Run an operation with an overall deadline covering every attempt and
    /// backoff.
    ///
    /// On expiry the in-flight attempt or wait is dropped. As with
    /// cancellation, nothing is reimbursed and debited tokens stay spent.
    pub async fn run_with_timeout<T, E, F, Fut>(
        &self,
        op: F,
        duration: Duration,
    ) -> Result<T, TimeoutError<RetryError<E>>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProvideErrorMetadata,
    {
        match tokio::time::timeout(duration, self.run(op)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(TimeoutError::Inner(e)),
            Err(_) => {
                log_event!(debug, ?duration, "operation timed out");
                Err(TimeoutError::Timeout { duration })
            }
        }
    }
}

/// Builder for [`RetryGovernor`].
pub struct RetryGovernorBuilder {
    config: RetryConfig,
    classifier: OutcomeClassifier,
    suspend: Arc<dyn Suspend>,
    hook: Option<AttemptHook>,
}

impl fmt::Debug for RetryGovernorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryGovernorBuilder")
            .field("config", &self.config)
            .field("suspend", &self.suspend)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl RetryGovernorBuilder {
    /// Replace the classification table.
    pub fn classifier(mut self, classifier: OutcomeClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace the backoff suspension.
    pub fn suspend(mut self, suspend: Arc<dyn Suspend>) -> Self {
        self.suspend = suspend;
        self
    }

    /// Observe every classified attempt of every operation.
    ///
    /// The hook runs synchronously inside the loop and should not block.
    pub fn on_attempt<H>(mut self, hook: H) -> Self
    where
        H: Fn(&AttemptRecord) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and build the governor with a full quota.
    pub fn build(self) -> Result<RetryGovernor, ConfigError> {
        self.config.validate()?;
        let quota = Arc::new(RetryQuota::new(self.config.capacity));
        Ok(RetryGovernor {
            inner: Arc::new(Inner {
                config: self.config,
                classifier: self.classifier,
                quota,
                suspend: self.suspend,
                hook: self.hook,
            }),
        })
    }
}
