//! Property-based tests for outcome classification

use std::time::Duration;

use proptest::prelude::*;
use retry_governor::testing::FakeError;
use retry_governor::{OutcomeClassifier, RetryKind, RetryableKind, TransportFailure};

fn transport_failure() -> impl Strategy<Value = Option<TransportFailure>> {
    prop_oneof![
        Just(None),
        Just(Some(TransportFailure::Timeout)),
        Just(Some(TransportFailure::Connection)),
        Just(Some(TransportFailure::Io)),
    ]
}

fn fake_error() -> impl Strategy<Value = FakeError> {
    (
        prop::option::of(prop_oneof![
            Just("ThrottlingException".to_string()),
            Just("RequestTimeout".to_string()),
            Just("AccessDenied".to_string()),
            "[A-Za-z]{1,24}",
        ]),
        prop::option::of(100u16..600),
        transport_failure(),
    )
        .prop_map(|(code, status, transport)| FakeError {
            code,
            status,
            transport,
            retry_after: None,
        })
}

proptest! {
    #[test]
    fn prop_classification_is_deterministic(error in fake_error()) {
        let classifier = OutcomeClassifier::standard();
        let outcome: Result<(), FakeError> = Err(error.clone());

        let first = classifier.classify(&outcome);
        let second = classifier.classify(&outcome);
        let from_clone = OutcomeClassifier::standard().classify(&Err::<(), _>(error));

        prop_assert_eq!(first, second);
        prop_assert_eq!(first, from_clone);
    }

    #[test]
    fn prop_errors_never_classify_as_success(error in fake_error()) {
        let kind = OutcomeClassifier::standard().classify_error(&error);
        prop_assert_ne!(kind, RetryKind::Unnecessary);
    }

    #[test]
    fn prop_success_always_unnecessary(value in any::<i64>()) {
        let outcome: Result<i64, FakeError> = Ok(value);
        prop_assert_eq!(
            OutcomeClassifier::standard().classify(&outcome),
            RetryKind::Unnecessary
        );
    }

    #[test]
    fn prop_unlisted_status_without_code_is_unretryable(status in 100u16..600) {
        prop_assume!(![429, 500, 502, 503, 504].contains(&status));
        let kind = OutcomeClassifier::standard().classify_error(&FakeError::status(status));
        prop_assert_eq!(kind, RetryKind::UnretryableFailure);
    }

    #[test]
    fn prop_empty_table_never_retries(error in fake_error()) {
        let kind = OutcomeClassifier::empty().classify_error(&error);
        prop_assert_eq!(kind, RetryKind::UnretryableFailure);
    }

    #[test]
    fn prop_throttling_code_overrides_status(status in 100u16..600) {
        let error = FakeError {
            code: Some("SlowDown".to_string()),
            status: Some(status),
            transport: None,
            retry_after: None,
        };
        prop_assert_eq!(
            OutcomeClassifier::standard().classify_error(&error),
            RetryKind::Retryable(RetryableKind::Throttling)
        );
    }

    #[test]
    fn prop_retry_after_never_changes_retryability(
        error in fake_error(),
        millis in 0u64..60_000
    ) {
        let classifier = OutcomeClassifier::standard();
        let plain = classifier.classify_error(&error);
        let hinted =
            classifier.classify_error(&error.with_retry_after(Duration::from_millis(millis)));

        prop_assert_eq!(plain.retryable(), hinted.retryable());
        if plain.retryable().is_some() {
            prop_assert_eq!(hinted.explicit_delay(), Some(Duration::from_millis(millis)));
        }
    }
}
