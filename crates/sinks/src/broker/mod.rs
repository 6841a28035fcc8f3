//! Broker Sink - length-prefixed TCP delivery
//!
//! Persists keyed messages to a remote message broker over a single TCP
//! connection. Acceptance and delivery are decoupled: [`BrokerSink`]
//! enqueues without blocking, and [`BrokerWriter`] drains the queue to
//! the broker from its own task.
//!
//! # Protocol
//!
//! Each message is framed as:
//! ```text
//! [4 bytes: length (big-endian)][1 byte: key length][key][payload]
//! ```
//! where the length covers everything after the prefix.
//!
//! # Design
//!
//! The queue is a bounded mpsc channel sized by `queue_depth`. A full
//! channel surfaces as [`SendOutcome::Busy`]; `poll` waits for capacity
//! up to the caller's budget. The writer reconnects on failure and
//! retries each message a bounded number of times before abandoning it.
//!
//! # Example
//!
//! ```ignore
//! let (sink, writer) = broker("broker", config);
//! let writer_task = tokio::spawn(writer.run());
//!
//! let outcome = sink.try_send("trace", payload);
//!
//! // Dropping every BrokerSink clone lets the writer drain and exit
//! drop(sink);
//! let snapshot = writer_task.await?;
//! ```

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use socket2::{SockRef, TcpKeepalive};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracepipe_config::SinkConfig;
use tracepipe_metrics::{SinkMetrics, SinkMetricsProvider, SinkMetricsSnapshot};

use crate::{SendOutcome, Sink, SinkError};

/// Write attempts per message before it is abandoned
const WRITE_ATTEMPTS: usize = 3;

/// Length prefix plus key-length byte
const FRAME_OVERHEAD: usize = 5;

/// A keyed message queued for delivery
#[derive(Debug)]
struct QueuedMessage {
    key: String,
    payload: Bytes,
}

/// Create a connected broker sink and writer pair
///
/// The sink is the enqueue side handed to the pipeline; the writer must
/// be spawned and runs until every sink clone has been dropped and the
/// queue is drained.
pub fn broker(name: impl Into<String>, config: SinkConfig) -> (BrokerSink, BrokerWriter) {
    let name = name.into();
    let (tx, rx) = mpsc::channel(config.queue_depth);
    let metrics = Arc::new(SinkMetrics::new());

    let sink = BrokerSink {
        name: name.clone(),
        tx,
        metrics: Arc::clone(&metrics),
    };
    let writer = BrokerWriter {
        name,
        config,
        receiver: rx,
        connection: None,
        metrics,
    };

    (sink, writer)
}

/// Enqueue side of the broker sink
#[derive(Clone)]
pub struct BrokerSink {
    name: String,
    tx: mpsc::Sender<QueuedMessage>,
    metrics: Arc<SinkMetrics>,
}

impl BrokerSink {
    /// Get a metrics handle for reporting
    ///
    /// The handle implements `SinkMetricsProvider` and can be registered
    /// with the metrics reporter. It remains valid after the sink and
    /// writer are gone.
    pub fn metrics_handle(&self) -> BrokerSinkMetricsHandle {
        BrokerSinkMetricsHandle {
            id: self.name.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

#[async_trait]
impl Sink for BrokerSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_send(&self, key: &str, payload: Bytes) -> SendOutcome {
        let msg = QueuedMessage {
            key: key.to_string(),
            payload,
        };
        match self.tx.try_send(msg) {
            Ok(()) => {
                self.metrics.record_enqueued();
                SendOutcome::Accepted
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_busy();
                SendOutcome::Busy
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Fatal,
        }
    }

    /// Wait for queue capacity, up to the budget
    async fn poll(&self, budget: Duration) {
        // A reserved permit is released on drop without sending
        let _ = timeout(budget, self.tx.reserve()).await;
    }
}

/// Handle for accessing broker sink metrics
///
/// Holds an Arc to the metrics, so it remains valid even after the
/// writer has exited.
#[derive(Clone)]
pub struct BrokerSinkMetricsHandle {
    id: String,
    metrics: Arc<SinkMetrics>,
}

impl SinkMetricsProvider for BrokerSinkMetricsHandle {
    fn sink_id(&self) -> &str {
        &self.id
    }

    fn sink_type(&self) -> &str {
        "broker"
    }

    fn snapshot(&self) -> SinkMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Drain side of the broker sink
///
/// Owns the TCP connection. Runs until the queue is closed and drained.
pub struct BrokerWriter {
    name: String,
    config: SinkConfig,
    receiver: mpsc::Receiver<QueuedMessage>,
    connection: Option<TcpStream>,
    metrics: Arc<SinkMetrics>,
}

impl BrokerWriter {
    /// Run the writer until every enqueue handle is dropped
    pub async fn run(mut self) -> SinkMetricsSnapshot {
        tracing::info!(
            sink = %self.name,
            target = %self.config.target,
            "broker sink starting"
        );

        // Attempt initial connection
        if let Err(e) = self.connect().await {
            tracing::warn!(
                sink = %self.name,
                target = %self.config.target,
                error = %e,
                "initial connection failed, will retry on first message"
            );
        }

        while let Some(msg) = self.receiver.recv().await {
            self.deliver(msg).await;
        }

        // Shutdown - close connection
        if let Some(stream) = self.connection.take() {
            let _ = stream.into_std();
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            sink = %self.name,
            messages_enqueued = snapshot.messages_enqueued,
            messages_written = snapshot.messages_written,
            bytes_written = snapshot.bytes_written,
            write_errors = snapshot.write_errors,
            reconnects = snapshot.reconnects,
            "broker sink shutting down"
        );

        snapshot
    }

    /// Deliver one message, reconnecting between attempts on failure
    async fn deliver(&mut self, msg: QueuedMessage) {
        let frame = encode_frame(&msg.key, &msg.payload);

        for attempt in 1..=WRITE_ATTEMPTS {
            if self.connection.is_none() {
                if let Err(e) = self.connect().await {
                    tracing::warn!(
                        sink = %self.name,
                        error = %e,
                        attempt,
                        "reconnection failed"
                    );
                    tokio::time::sleep(self.config.reconnect_interval).await;
                    continue;
                }
            }

            match self.write_frame(&frame).await {
                Ok(()) => {
                    self.metrics.record_written(frame.len() as u64);
                    return;
                }
                Err(e) => {
                    self.metrics.record_error();
                    tracing::warn!(
                        sink = %self.name,
                        error = %e,
                        attempt,
                        max_attempts = WRITE_ATTEMPTS,
                        "write attempt failed"
                    );
                }
            }
        }

        tracing::error!(
            sink = %self.name,
            key = %msg.key,
            bytes = msg.payload.len(),
            "message abandoned after repeated write failures"
        );
    }

    /// Connect to the broker
    async fn connect(&mut self) -> Result<(), SinkError> {
        // Close existing connection if any
        if let Some(stream) = self.connection.take() {
            let _ = stream.into_std();
        }

        self.metrics.record_reconnect();

        let connect_result = timeout(
            self.config.connection_timeout,
            TcpStream::connect(&self.config.target),
        )
        .await;

        let stream = match connect_result {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(SinkError::connection_failed(self.config.target.clone(), e));
            }
            Err(_) => {
                return Err(SinkError::connection_failed(
                    self.config.target.clone(),
                    std::io::Error::new(ErrorKind::TimedOut, "connection timed out"),
                ));
            }
        };

        // Non-fatal if it fails
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(
                sink = %self.name,
                error = %e,
                "failed to set TCP_NODELAY, continuing with default buffering"
            );
        }

        // Non-fatal if it fails
        if self.config.tcp_keepalive {
            let sock_ref = SockRef::from(&stream);
            let keepalive = TcpKeepalive::new().with_time(self.config.tcp_keepalive_interval);

            // On Linux, also set the interval between probes
            #[cfg(target_os = "linux")]
            let keepalive = keepalive.with_interval(self.config.tcp_keepalive_interval);

            if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
                tracing::debug!(
                    sink = %self.name,
                    error = %e,
                    "failed to set TCP keep-alive, continuing without keep-alive"
                );
            }
        }

        tracing::debug!(
            sink = %self.name,
            target = %self.config.target,
            "connected to broker"
        );

        self.connection = Some(stream);
        Ok(())
    }

    /// Write one frame with the configured timeout
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), SinkError> {
        let stream = self.connection.as_mut().ok_or(SinkError::Closed)?;

        let write_result = timeout(self.config.write_timeout, async {
            stream.write_all(frame).await?;
            stream.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await;

        match write_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // Connection error - invalidate connection
                self.connection = None;
                Err(SinkError::Io(e))
            }
            Err(_) => {
                // Timeout - invalidate connection
                self.connection = None;
                Err(SinkError::Timeout)
            }
        }
    }
}

/// Frame a keyed message for the wire
///
/// Keys longer than 255 bytes are truncated; in practice keys are short
/// constants like "trace".
fn encode_frame(key: &str, payload: &[u8]) -> Bytes {
    let key = &key.as_bytes()[..key.len().min(u8::MAX as usize)];
    let body_len = 1 + key.len() + payload.len();

    let mut frame = BytesMut::with_capacity(FRAME_OVERHEAD + key.len() + payload.len());
    frame.put_u32(body_len as u32);
    frame.put_u8(key.len() as u8);
    frame.put_slice(key);
    frame.put_slice(payload);
    frame.freeze()
}

/// Parse a broker frame body back into key and payload
///
/// The body excludes the 4-byte length prefix. Used by the consumer
/// when reading messages back from the broker.
pub fn decode_frame_body(body: &[u8]) -> Option<(&str, &[u8])> {
    let (&key_len, rest) = body.split_first()?;
    if rest.len() < key_len as usize {
        return None;
    }
    let (key, payload) = rest.split_at(key_len as usize);
    let key = std::str::from_utf8(key).ok()?;
    Some((key, payload))
}
