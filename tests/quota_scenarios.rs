//! End-to-end quota accounting across operations sharing one governor.

use std::sync::Arc;

use proptest::prelude::*;
use retry_governor::testing::{FakeError, RecordingSuspend, ScriptedTransport};
use retry_governor::{
    assert_terminated, JitterStrategy, RetryConfig, RetryCosts, RetryGovernor, TerminationReason,
};

fn config(capacity: u64, cost: u64, reimbursement: u64, max_attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_capacity(capacity)
        .with_costs(RetryCosts::uniform(cost))
        .with_reimbursement(reimbursement)
        .with_jitter(JitterStrategy::None)
        .with_max_attempts(max_attempts)
}

fn governor(config: RetryConfig) -> RetryGovernor {
    RetryGovernor::builder(config)
        .suspend(Arc::new(RecordingSuspend::new()))
        .build()
        .unwrap()
}

fn throttled() -> FakeError {
    FakeError::code("ThrottlingException")
}

/// `retries` retryable failures followed by a success.
fn retries_then_success(retries: usize) -> ScriptedTransport<&'static str, FakeError> {
    let mut script: Vec<Result<&'static str, FakeError>> = vec![Err(throttled()); retries];
    script.push(Ok("ok"));
    ScriptedTransport::new(script)
}

#[tokio::test]
async fn scenario_a_three_retries_then_success() {
    let governor = governor(config(500, 5, 10, 5));
    let transport = retries_then_success(3);

    let result = governor.run(|| transport.next()).await;

    assert_eq!(result, Ok("ok"));
    assert_eq!(transport.attempts(), 4);
    assert_eq!(governor.quota().available(), 495);
}

#[tokio::test]
async fn scenario_b_retry_then_unretryable() {
    let governor = governor(config(500, 5, 10, 5));
    let transport =
        ScriptedTransport::<(), _>::new(vec![Err(throttled()), Err(FakeError::status(403))]);

    let result = governor.run(|| transport.next()).await;

    assert_terminated!(result, TerminationReason::Unretryable);
    assert_eq!(governor.quota().available(), 495);
}

#[tokio::test]
async fn scenarios_a_and_b_concurrently_are_order_independent() {
    let governor = governor(config(500, 5, 10, 5));
    let a = retries_then_success(3);
    let b = ScriptedTransport::<&'static str, _>::new(vec![
        Err(throttled()),
        Err(FakeError::status(403)),
    ]);

    let (ra, rb) = tokio::join!(governor.run(|| a.next()), governor.run(|| b.next()));

    assert_eq!(ra, Ok("ok"));
    assert_terminated!(rb, TerminationReason::Unretryable);
    assert_eq!(governor.quota().available(), 490);
}

#[tokio::test]
async fn success_without_retry_reimburses() {
    let governor = governor(config(500, 5, 10, 5));
    assert!(governor.quota().try_debit(50));

    for _ in 0..3 {
        let transport = retries_then_success(0);
        governor.run(|| transport.next()).await.unwrap();
    }

    assert_eq!(governor.quota().available(), 480);
}

#[tokio::test]
async fn retry_then_succeed_cycles_do_not_drain_quota() {
    let governor = governor(config(500, 5, 5, 3));

    let mut lowest = governor.quota().available();
    for _ in 0..1_000 {
        let transport = retries_then_success(1);
        governor.run(|| transport.next()).await.unwrap();
        lowest = lowest.min(governor.quota().available());
    }

    assert_eq!(lowest, 500);
    assert_eq!(governor.quota().available(), 500);

    // Retries are still permitted after sustained load.
    let transport = retries_then_success(2);
    assert_eq!(governor.run(|| transport.next()).await, Ok("ok"));
}

#[tokio::test]
async fn balance_recovers_after_failure_burst() {
    let governor = governor(config(50, 5, 5, 3));

    // Drain with operations that never succeed.
    for _ in 0..5 {
        let transport = ScriptedTransport::<(), _>::new(vec![Err(FakeError::status(503))]);
        let _ = governor.run(|| transport.next()).await;
    }
    assert_eq!(governor.quota().available(), 0);

    let transport = ScriptedTransport::<(), _>::new(vec![Err(FakeError::status(503))]);
    assert_terminated!(
        governor.run(|| transport.next()).await,
        TerminationReason::QuotaExhausted
    );

    // Plain successes refill the quota.
    for _ in 0..10 {
        let transport = retries_then_success(0);
        governor.run(|| transport.next()).await.unwrap();
    }
    assert_eq!(governor.quota().available(), 50);

    let transport = retries_then_success(1);
    assert_eq!(governor.run(|| transport.next()).await, Ok("ok"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_lose_no_updates() {
    let governor = governor(config(10_000, 5, 10, 5));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let governor = governor.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let transport = retries_then_success(2);
                    governor.run(|| transport.next()).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // Every operation debited 10 and reimbursed 10.
    assert_eq!(governor.quota().available(), 10_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_account_exactly() {
    let governor = governor(config(10_000, 5, 10, 5));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let governor = governor.clone();
            tokio::spawn(async move {
                for _ in 0..10 {
                    let transport = ScriptedTransport::<(), _>::new(vec![
                        Err(throttled()),
                        Err(FakeError::status(404)),
                    ]);
                    let _ = governor.run(|| transport.next()).await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // 320 operations, one debited retry each, nothing reimbursed.
    assert_eq!(governor.quota().available(), 10_000 - 320 * 5);
}

proptest! {
    #[test]
    fn prop_success_balance_matches_accounting(
        retries in 0usize..4,
        spent in 0u64..500,
        reimbursement in 1u64..50
    ) {
        let governor = governor(config(500, 5, reimbursement, 5));
        prop_assume!(governor.quota().try_debit(spent));
        let before = governor.quota().available();
        let transport = retries_then_success(retries);

        let result = futures::executor::block_on(governor.run(|| transport.next()));

        if before >= 5 * retries as u64 {
            prop_assert_eq!(result, Ok("ok"));
            let expected = (before - 5 * retries as u64 + reimbursement).min(500);
            prop_assert_eq!(governor.quota().available(), expected);
        } else {
            prop_assert!(result.unwrap_err().is_quota_exhausted());
        }
    }

    #[test]
    fn prop_attempts_never_exceed_max(max_attempts in 1u32..10) {
        let governor = governor(config(500, 5, 5, max_attempts));
        let transport = ScriptedTransport::<(), _>::new(vec![Err(FakeError::status(500))]);

        let err = futures::executor::block_on(governor.run(|| transport.next())).unwrap_err();

        prop_assert!(err.is_max_attempts_exceeded());
        prop_assert_eq!(err.attempts, max_attempts);
        prop_assert_eq!(transport.attempts(), max_attempts);
    }
}
