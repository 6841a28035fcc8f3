use std::sync::Arc;
use std::time::Duration;

use tracepipe_config::PipelineConfig;
use tracepipe_metrics::SessionMetricsSource;
use tracepipe_protocol::{RecordIter, SESSION_KEY, TRACE_KEY};
use tracepipe_sinks::{MemorySink, RetryPolicy};

use crate::error::PipelineError;
use crate::session::SessionHandle;

use super::SessionManager;

fn test_config() -> PipelineConfig {
    PipelineConfig {
        // Long poll period: tests drive persistence through close()
        poll_period: Duration::from_secs(60),
        record_bound: 1024,
        message_bound: 4096,
        buffer_size: 256,
        shutdown_wait_ceiling: Duration::from_secs(5),
    }
}

fn manager(sink: &Arc<MemorySink>) -> SessionManager {
    let sink: Arc<dyn tracepipe_sinks::Sink> = sink.clone();
    SessionManager::new(test_config(), sink)
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
}

#[tokio::test]
async fn test_open_write_close_lifecycle() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(1);

    manager.open(handle, &[20, 24]).unwrap();
    assert_eq!(manager.open_sessions(), 1);

    assert!(manager.write(handle, b"one").unwrap());
    assert!(manager.write(handle, b"two").unwrap());

    let summary = manager.close(handle).await.unwrap();
    assert!(summary.clean);
    assert_eq!(manager.open_sessions(), 0);

    // Metadata first, then the final flush carrying both records
    assert_eq!(sink.payloads_for(SESSION_KEY).len(), 1);
    let messages = sink.payloads_for(TRACE_KEY);
    assert_eq!(messages.len(), 1);
    let payloads: Vec<_> = RecordIter::new(&messages[0])
        .map(|r| r.unwrap().payload.to_vec())
        .collect();
    assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec()]);
}

#[tokio::test]
async fn test_duplicate_open_rejected() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(5);

    manager.open(handle, &[]).unwrap();
    let err = manager.open(handle, &[]).unwrap_err();

    assert!(matches!(err, PipelineError::DuplicateHandle(h) if h == handle));
    assert_eq!(manager.open_sessions(), 1);
}

#[tokio::test]
async fn test_rejected_duplicate_open_never_reaches_the_sink() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(21);

    manager.open(handle, &[]).unwrap();
    manager.open(handle, &[]).unwrap_err();

    // Let the rejected registration's task observe its dropped start
    // signal before the session is closed
    tokio::task::yield_now().await;
    manager.close(handle).await.unwrap();

    // Only the surviving session may have persisted metadata
    assert_eq!(sink.payloads_for(SESSION_KEY).len(), 1);
}

#[tokio::test]
async fn test_open_rejects_oversized_declared_records() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    let err = manager
        .open(SessionHandle::new(2), &[100, 2048])
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::RecordTooLarge { size: 2048, bound: 1024 }
    ));
    // No session state may exist after a rejected open
    assert_eq!(manager.open_sessions(), 0);
}

#[tokio::test]
async fn test_write_to_unknown_session() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    let err = manager.write(SessionHandle::new(99), b"x").unwrap_err();
    assert!(matches!(err, PipelineError::UnknownHandle(h) if h.raw() == 99));
}

#[tokio::test]
async fn test_write_over_record_bound_is_an_error() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(3);
    manager.open(handle, &[]).unwrap();

    let err = manager.write(handle, &[0u8; 2000]).unwrap_err();
    assert!(matches!(err, PipelineError::RecordTooLarge { .. }));

    manager.close(handle).await.unwrap();
}

#[tokio::test]
async fn test_full_buffer_drops_without_error() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(4);
    manager.open(handle, &[]).unwrap();

    // buffer_size is 256; the second 200-byte record cannot fit
    assert!(manager.write(handle, &[1u8; 200]).unwrap());
    assert!(!manager.write(handle, &[2u8; 200]).unwrap());

    let summary = manager.close(handle).await.unwrap();
    assert_eq!(summary.metrics.buffer_drops, 1);
    assert_eq!(summary.metrics.records_written, 1);
}

#[tokio::test]
async fn test_close_unknown_and_double_close() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(6);

    let err = manager.close(handle).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownHandle(_)));

    manager.open(handle, &[]).unwrap();
    manager.close(handle).await.unwrap();

    let err = manager.close(handle).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownHandle(_)));
}

#[tokio::test]
async fn test_handle_reusable_after_close() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(8);

    manager.open(handle, &[]).unwrap();
    manager.close(handle).await.unwrap();
    manager.open(handle, &[]).unwrap();

    assert_eq!(manager.open_sessions(), 1);
    manager.close(handle).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_all_sessions() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    for raw in 1..=3 {
        let handle = SessionHandle::new(raw);
        manager.open(handle, &[]).unwrap();
        assert!(manager.write(handle, b"tail").unwrap());
    }

    manager.shutdown().await;

    assert_eq!(manager.open_sessions(), 0);
    assert_eq!(sink.payloads_for(SESSION_KEY).len(), 3);
    // Every session's final flush must have run
    assert_eq!(sink.payloads_for(TRACE_KEY).len(), 3);
}

#[tokio::test]
async fn test_session_snapshots_track_registry() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    manager.open(SessionHandle::new(10), &[]).unwrap();
    manager.open(SessionHandle::new(11), &[]).unwrap();
    assert!(manager.write(SessionHandle::new(10), b"rec").unwrap());

    let mut snapshots = manager.session_snapshots();
    snapshots.sort_by_key(|(handle, _)| *handle);

    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].0, 10);
    assert_eq!(snapshots[0].1.records_written, 1);
    assert_eq!(snapshots[1].1.records_written, 0);

    manager.shutdown().await;
    assert!(manager.session_snapshots().is_empty());
}

#[tokio::test]
async fn test_record_error_counted_on_close() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);
    let handle = SessionHandle::new(12);
    manager.open(handle, &[]).unwrap();

    manager.record_error(handle).unwrap();
    manager.record_error(handle).unwrap();

    let summary = manager.close(handle).await.unwrap();
    assert_eq!(summary.metrics.record_errors, 2);
}
