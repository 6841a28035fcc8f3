use bytes::Bytes;

use crate::{SendOutcome, Sink};

use super::MemorySink;

#[test]
fn test_accepts_by_default() {
    let sink = MemorySink::new();

    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"a")),
        SendOutcome::Accepted
    );
    assert_eq!(
        sink.try_send("session", Bytes::from_static(b"b")),
        SendOutcome::Accepted
    );

    assert_eq!(sink.captured_len(), 2);
    assert_eq!(sink.payloads_for("trace"), vec![Bytes::from_static(b"a")]);
}

#[test]
fn test_scripted_outcomes_consumed_in_order() {
    let sink = MemorySink::new();
    sink.script([SendOutcome::Busy, SendOutcome::Busy, SendOutcome::Accepted]);

    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"x")),
        SendOutcome::Busy
    );
    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"x")),
        SendOutcome::Busy
    );
    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"x")),
        SendOutcome::Accepted
    );

    // Busy attempts must not capture the payload
    assert_eq!(sink.captured_len(), 1);

    // Script exhausted, back to accepting
    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"y")),
        SendOutcome::Accepted
    );
}

#[test]
fn test_fatal_does_not_capture() {
    let sink = MemorySink::new();
    sink.script([SendOutcome::Fatal]);

    assert_eq!(
        sink.try_send("trace", Bytes::from_static(b"x")),
        SendOutcome::Fatal
    );
    assert_eq!(sink.captured_len(), 0);
}

#[tokio::test]
async fn test_poll_accounting() {
    use std::time::Duration;

    let sink = MemorySink::new();
    sink.poll(Duration::from_millis(250)).await;
    sink.poll(Duration::from_millis(250)).await;

    assert_eq!(sink.poll_count(), 2);
    assert_eq!(sink.poll_time(), Duration::from_millis(500));
}
