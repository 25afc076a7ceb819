//! Demonstrates tracing integration with the retry governor
//!
//! Every operation runs inside a `retry_operation` span; classification,
//! backoff and quota decisions are emitted as events within it.
//!
//! Run with: cargo run --example tracing_demo --features tracing

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use retry_governor::prelude::*;
use retry_governor::testing::FakeError;
use retry_governor::{JitterStrategy, RetryCosts, TransportFailure};
use tracing::Instrument;

#[tokio::main]
async fn main() {
    // Set up tracing subscriber
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_target(false)
        .init();

    tracing::info!("Starting tracing demo");

    let governor = match RetryGovernor::new(
        RetryConfig::default()
            .with_capacity(10)
            .with_costs(RetryCosts::uniform(5))
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_jitter(JitterStrategy::Full)
            .with_max_attempts(3),
    ) {
        Ok(governor) => governor,
        Err(e) => {
            tracing::error!("invalid retry config: {}", e);
            return;
        }
    };

    // Retries once, succeeds, reimburses.
    let attempts = AtomicU32::new(0);
    let result = governor
        .run(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FakeError::transport(TransportFailure::Timeout))
                } else {
                    Ok("fetched")
                }
            }
        })
        .instrument(tracing::info_span!("fetch", object = "users/42"))
        .await;
    tracing::info!(?result, "fetch finished");

    // Keeps failing until the quota runs dry.
    for request in 0..2 {
        let result: Result<(), _> = governor
            .run(|| async { Err(FakeError::status(503)) })
            .instrument(tracing::info_span!("upload", request))
            .await;
        match result {
            Ok(()) => tracing::info!("upload succeeded"),
            Err(e) => tracing::warn!(reason = %e.reason, "upload failed: {}", e),
        }
    }

    tracing::info!(
        available = governor.quota().available(),
        capacity = governor.quota().capacity(),
        "final quota"
    );
}
