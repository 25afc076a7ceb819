//! Governor Patterns Example
//!
//! Demonstrates retry governance for a network client. Shows practical
//! patterns including:
//! - One governor shared by every request a client issues
//! - Handling quota exhaustion as a client-wide overload signal
//! - Honouring a server-supplied `Retry-After`
//! - Putting a deadline on an operation with `run_with_timeout`
//!
//! Run with: cargo run --example governor_patterns

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use retry_governor::prelude::*;
use retry_governor::{ErrorMetadata, JitterStrategy, RetryCosts, TransportFailure};

// ==================== A toy transport ====================

/// Errors a real HTTP client might surface.
#[derive(Debug, Clone)]
enum HttpError {
    Status(u16),
    Throttled { retry_after: Option<Duration> },
    ConnectionReset,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Status(status) => write!(f, "HTTP {}", status),
            HttpError::Throttled { .. } => write!(f, "HTTP 429 Too Many Requests"),
            HttpError::ConnectionReset => write!(f, "connection reset by peer"),
        }
    }
}

impl std::error::Error for HttpError {}

impl ProvideErrorMetadata for HttpError {
    fn error_metadata(&self) -> ErrorMetadata<'_> {
        match self {
            HttpError::Status(status) => ErrorMetadata::new().with_status(*status),
            HttpError::Throttled { retry_after } => {
                let meta = ErrorMetadata::new()
                    .with_status(429)
                    .with_code("TooManyRequestsException");
                match retry_after {
                    Some(delay) => meta.with_retry_after(*delay),
                    None => meta,
                }
            }
            HttpError::ConnectionReset => {
                ErrorMetadata::new().with_transport(TransportFailure::Connection)
            }
        }
    }
}

/// A request that fails `failures` times with `error`, then succeeds.
async fn flaky_request(
    attempts: &AtomicU32,
    failures: u32,
    error: HttpError,
) -> Result<&'static str, HttpError> {
    let n = attempts.fetch_add(1, Ordering::SeqCst);
    println!("  attempt {}", n + 1);
    if n < failures {
        Err(error)
    } else {
        Ok("200 OK")
    }
}

fn client_config() -> RetryConfig {
    RetryConfig::default()
        .with_capacity(20)
        .with_costs(RetryCosts::uniform(5))
        .with_reimbursement(5)
        .with_base_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_millis(200))
        .with_jitter(JitterStrategy::Full)
        .with_max_attempts(4)
}

// ==================== Shared governor ====================

/// Example 1: many requests, one quota
///
/// Clones of a governor share the same quota, so concurrent requests from
/// one client draw from a single budget.
async fn example_shared_governor(governor: &RetryGovernor) {
    println!("\n=== Example 1: Shared Governor ===");

    let handles: Vec<_> = (0..3)
        .map(|id| {
            let governor = governor.clone();
            tokio::spawn(async move {
                let attempts = AtomicU32::new(0);
                let result = governor
                    .run(|| flaky_request(&attempts, 1, HttpError::ConnectionReset))
                    .await;
                println!("  request {} -> {:?}", id, result);
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.await;
    }

    println!(
        "  quota after: {}/{}",
        governor.quota().available(),
        governor.quota().capacity()
    );
}

// ==================== Quota exhaustion ====================

/// Example 2: the quota runs dry
///
/// A burst of failing requests drains the quota; further retries are refused
/// until successes refill it.
async fn example_quota_exhaustion(governor: &RetryGovernor) {
    println!("\n=== Example 2: Quota Exhaustion ===");

    for id in 0..4 {
        let attempts = AtomicU32::new(0);
        let result = governor
            .run(|| flaky_request(&attempts, u32::MAX, HttpError::Status(503)))
            .await;
        match result {
            Ok(body) => println!("  request {} -> {}", id, body),
            Err(e) if e.is_quota_exhausted() => {
                println!("  request {} -> client overloaded, shedding: {}", id, e);
            }
            Err(e) => println!("  request {} -> gave up: {}", id, e),
        }
        println!("  quota: {}", governor.quota().available());
    }

    println!("  successful requests refill the quota:");
    for _ in 0..4 {
        let attempts = AtomicU32::new(0);
        let _ = governor
            .run(|| flaky_request(&attempts, 0, HttpError::Status(503)))
            .await;
    }
    println!("  quota: {}", governor.quota().available());
}

// ==================== Retry-After ====================

/// Example 3: the server says when to come back
async fn example_retry_after(governor: &RetryGovernor) {
    println!("\n=== Example 3: Retry-After ===");

    let attempts = AtomicU32::new(0);
    let start = tokio::time::Instant::now();
    let result = governor
        .run(|| {
            flaky_request(
                &attempts,
                1,
                HttpError::Throttled {
                    retry_after: Some(Duration::from_millis(150)),
                },
            )
        })
        .await;
    println!("  {:?} after {:?}", result, start.elapsed());
}

// ==================== Timeout ====================

/// Example 4: an overall deadline across attempts and backoff
async fn example_timeout(governor: &RetryGovernor) {
    println!("\n=== Example 4: Timeout ===");

    let attempts = AtomicU32::new(0);
    let result = governor
        .run_with_timeout(
            || flaky_request(&attempts, u32::MAX, HttpError::Throttled { retry_after: None }),
            Duration::from_millis(30),
        )
        .await;

    match result {
        Ok(body) => println!("  got {}", body),
        Err(e) if e.is_timeout() => println!("  deadline hit: {}", e),
        Err(e) => println!("  failed before the deadline: {}", e),
    }
}

#[tokio::main]
async fn main() {
    let seen = Arc::new(AtomicU32::new(0));
    let governor = RetryGovernor::builder(client_config())
        .on_attempt({
            let seen = Arc::clone(&seen);
            move |_| {
                seen.fetch_add(1, Ordering::Relaxed);
            }
        })
        .build()
        .unwrap_or_else(|e| panic!("invalid retry config: {}", e));

    example_shared_governor(&governor).await;
    example_quota_exhaustion(&governor).await;
    example_retry_after(&governor).await;
    example_timeout(&governor).await;

    println!("\n{} attempts observed in total", seen.load(Ordering::Relaxed));
}
