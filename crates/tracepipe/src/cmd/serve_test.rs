use std::sync::Arc;
use std::time::Duration;

use tracepipe_config::PipelineConfig;
use tracepipe_pipeline::{SessionHandle, SessionManager};
use tracepipe_sinks::{MemorySink, Sink};

use super::{
    parse_handle, parse_open, process_request, OP_CLOSE, OP_OPEN, OP_WRITE, STATUS_DROPPED,
    STATUS_ERROR, STATUS_OK,
};

fn manager(sink: &Arc<MemorySink>) -> Arc<SessionManager> {
    let config = PipelineConfig {
        poll_period: Duration::from_secs(60),
        record_bound: 1024,
        message_bound: 4096,
        buffer_size: 256,
        shutdown_wait_ceiling: Duration::from_secs(5),
    };
    let sink: Arc<dyn Sink> = sink.clone();
    Arc::new(SessionManager::new(config, sink))
}

fn open_body(handle: u64, sizes: &[u32]) -> Vec<u8> {
    let mut body = vec![OP_OPEN];
    body.extend_from_slice(&handle.to_be_bytes());
    body.extend_from_slice(&(sizes.len() as u16).to_be_bytes());
    for size in sizes {
        body.extend_from_slice(&size.to_be_bytes());
    }
    body
}

fn write_body(handle: u64, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![OP_WRITE];
    body.extend_from_slice(&handle.to_be_bytes());
    body.extend_from_slice(payload);
    body
}

fn close_body(handle: u64) -> Vec<u8> {
    let mut body = vec![OP_CLOSE];
    body.extend_from_slice(&handle.to_be_bytes());
    body
}

#[test]
fn test_parse_handle_splits_remainder() {
    let mut body = 42u64.to_be_bytes().to_vec();
    body.extend_from_slice(b"payload");

    let (handle, rest) = parse_handle(&body).unwrap();
    assert_eq!(handle, SessionHandle::new(42));
    assert_eq!(rest, b"payload");

    assert!(parse_handle(&[0u8; 7]).is_none());
}

#[test]
fn test_parse_open_sizes() {
    let body = open_body(9, &[20, 64, 128]);

    let (handle, sizes) = parse_open(&body[1..]).unwrap();
    assert_eq!(handle.raw(), 9);
    assert_eq!(sizes, vec![20, 64, 128]);
}

#[test]
fn test_parse_open_rejects_size_mismatch() {
    // Claims two sizes but carries one
    let mut body = open_body(9, &[20]);
    body[9] = 0;
    body[10] = 2;
    assert!(parse_open(&body[1..]).is_none());

    assert!(parse_open(&[0u8; 9]).is_none());
}

#[tokio::test]
async fn test_request_lifecycle() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    assert_eq!(
        process_request(&manager, &open_body(1, &[20])).await,
        STATUS_OK
    );
    assert_eq!(
        process_request(&manager, &write_body(1, b"record")).await,
        STATUS_OK
    );
    assert_eq!(process_request(&manager, &close_body(1)).await, STATUS_OK);
    assert_eq!(manager.open_sessions(), 0);
}

#[tokio::test]
async fn test_request_errors() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    // Unknown session
    assert_eq!(
        process_request(&manager, &write_body(5, b"x")).await,
        STATUS_ERROR
    );
    assert_eq!(process_request(&manager, &close_body(5)).await, STATUS_ERROR);

    // Declared record size over the bound
    assert_eq!(
        process_request(&manager, &open_body(5, &[4096])).await,
        STATUS_ERROR
    );

    // Duplicate open
    assert_eq!(
        process_request(&manager, &open_body(6, &[])).await,
        STATUS_OK
    );
    assert_eq!(
        process_request(&manager, &open_body(6, &[])).await,
        STATUS_ERROR
    );

    // Unknown opcode and empty body
    assert_eq!(process_request(&manager, &[99, 0, 0]).await, STATUS_ERROR);
    assert_eq!(process_request(&manager, &[]).await, STATUS_ERROR);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_write_reports_buffer_drop() {
    let sink = Arc::new(MemorySink::new());
    let manager = manager(&sink);

    assert_eq!(
        process_request(&manager, &open_body(2, &[])).await,
        STATUS_OK
    );

    // buffer_size is 256: the first 200-byte record fits, the next does not
    assert_eq!(
        process_request(&manager, &write_body(2, &[1u8; 200])).await,
        STATUS_OK
    );
    assert_eq!(
        process_request(&manager, &write_body(2, &[2u8; 200])).await,
        STATUS_DROPPED
    );

    manager.shutdown().await;
}
