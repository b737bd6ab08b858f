//! Retry/backoff behavior under virtual time
//!
//! Runs with the tokio clock paused, so every backoff sleep auto-advances
//! and elapsed time is exactly the sum of the backoffs taken.

use council_runner::platform::PlatformError;
use council_runner::retry::{with_retry, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base: Duration::from_millis(500),
        max: Duration::from_millis(8_000),
    }
}

fn bad_gateway() -> PlatformError {
    PlatformError::Transient {
        status: Some(502),
        message: "bad gateway".to_string(),
    }
}

/// Test: two transient failures then success sleeps 500ms + 1000ms
#[tokio::test(start_paused = true)]
async fn test_transient_then_success() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let start = Instant::now();

    let result = with_retry(&policy(3), "list_comments", || async move {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            Err(bad_gateway())
        } else {
            Ok(n)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1_500), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1_600), "elapsed {:?}", elapsed);
}

/// Test: retries stop after max_retries and the last transient error is returned
#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let start = Instant::now();

    let result: Result<(), _> = with_retry(&policy(2), "create_review", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(bad_gateway())
    })
    .await;

    let err = result.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(502));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "first attempt plus two retries");
    assert!(start.elapsed() >= Duration::from_millis(1_500));
}

/// Test: permission errors fail on the first attempt without sleeping
#[tokio::test(start_paused = true)]
async fn test_permission_denied_not_retried() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let start = Instant::now();

    let result: Result<(), _> = with_retry(&policy(5), "create_review", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(PlatformError::from_status(403, "Resource not accessible by integration"))
    })
    .await;

    assert!(matches!(
        result,
        Err(PlatformError::PermissionDenied { status: 403, .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

/// Test: zero retries means exactly one attempt
#[tokio::test(start_paused = true)]
async fn test_zero_retries_single_attempt() {
    let calls = AtomicU32::new(0);
    let calls = &calls;

    let result: Result<(), _> = with_retry(&policy(0), "pull_request", || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(PlatformError::from_status(503, "unavailable"))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
