use std::time::Duration;

use bytes::Bytes;

use crate::memory::MemorySink;
use crate::{SendOutcome, SinkError};

use super::{send_with_retry, RetryPolicy};

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1))
}

#[tokio::test]
async fn test_accepted_first_try() {
    let sink = MemorySink::new();

    let busy = send_with_retry(&sink, &policy(3), "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap();

    assert_eq!(busy, 0);
    assert_eq!(sink.poll_count(), 0);
    assert_eq!(sink.captured_len(), 1);
}

#[tokio::test]
async fn test_busy_twice_then_accepted() {
    let sink = MemorySink::new();
    sink.script([SendOutcome::Busy, SendOutcome::Busy]);

    let busy = send_with_retry(&sink, &policy(5), "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap();

    assert_eq!(busy, 2);
    // One poll per Busy response
    assert_eq!(sink.poll_count(), 2);
    assert_eq!(sink.captured_len(), 1);
}

#[tokio::test]
async fn test_backpressure_after_exhaustion() {
    let sink = MemorySink::new();
    sink.script(std::iter::repeat(SendOutcome::Busy).take(10));

    let err = send_with_retry(&sink, &policy(3), "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap_err();

    match err {
        SinkError::Backpressure { attempts } => assert_eq!(attempts, 3),
        other => panic!("expected Backpressure, got {other}"),
    }
    // No poll after the final attempt
    assert_eq!(sink.poll_count(), 2);
    assert_eq!(sink.captured_len(), 0);
}

#[tokio::test]
async fn test_fatal_fails_immediately() {
    let sink = MemorySink::new();
    sink.script([SendOutcome::Fatal]);

    let err = send_with_retry(&sink, &policy(5), "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap_err();

    assert!(matches!(err, SinkError::Closed));
    assert_eq!(sink.poll_count(), 0);
}

#[tokio::test]
async fn test_zero_attempts_treated_as_one() {
    let sink = MemorySink::new();

    let busy = send_with_retry(&sink, &policy(0), "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap();

    assert_eq!(busy, 0);
    assert_eq!(sink.captured_len(), 1);
}

#[tokio::test]
async fn test_poll_budget_passed_through() {
    let sink = MemorySink::new();
    sink.script([SendOutcome::Busy]);

    let policy = RetryPolicy::new(2, Duration::from_millis(40));
    send_with_retry(&sink, &policy, "trace", Bytes::from_static(b"msg"))
        .await
        .unwrap();

    assert_eq!(sink.poll_time(), Duration::from_millis(40));
}
