//! Serve command - the ingest daemon
//!
//! Runs the session manager behind a TCP control listener. Producers
//! speak a small length-prefixed protocol:
//!
//! ```text
//! [4 bytes: length (big-endian)][1 byte: opcode][body]
//! ```
//!
//! Opcodes:
//! - `1` OPEN:  `[u64 handle][u16 size count][u32 record size]...`
//! - `2` WRITE: `[u64 handle][record payload]`
//! - `3` CLOSE: `[u64 handle]`
//!
//! Each request is answered with one status byte: `0` accepted, `1`
//! dropped by a full buffer, `2` error.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracepipe_config::{Config, SinkKind};
use tracepipe_metrics::{
    Reporter, SessionMetricsSource, SinkMetricsProvider, SinkMetricsSnapshot,
};
use tracepipe_pipeline::{PipelineError, SessionHandle, SessionManager};
use tracepipe_sinks::{broker, NullSink, Sink};
use tracing::{debug, info, warn};

const OP_OPEN: u8 = 1;
const OP_WRITE: u8 = 2;
const OP_CLOSE: u8 = 3;

const STATUS_OK: u8 = 0;
const STATUS_DROPPED: u8 = 1;
const STATUS_ERROR: u8 = 2;

/// Requests larger than this are treated as protocol corruption
const MAX_REQUEST: usize = 16 << 20;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// Run the ingest daemon until SIGINT or SIGTERM
pub async fn run(args: ServeArgs) -> Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    crate::init_logging(&config.log, args.log_level.as_deref())?;

    info!(
        config = %args.config.display(),
        sink = ?config.sink.kind,
        "tracepipe starting"
    );

    let (sink, writer_task, sink_metrics) = build_sink(&config);
    let manager = Arc::new(SessionManager::new(config.pipeline, sink));
    let cancel = CancellationToken::new();

    let mut reporter = Reporter::builder()
        .config(config.metrics)
        .sessions(Arc::clone(&manager) as Arc<dyn SessionMetricsSource>);
    if let Some(provider) = sink_metrics {
        reporter = reporter.sink(provider);
    }
    let reporter_task = tokio::spawn(reporter.build().run(cancel.child_token()));

    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("binding ingest listener on {}", config.server.listen))?;
    info!(listen = %config.server.listen, "ingest listener started");
    let accept_task = tokio::spawn(accept_loop(
        listener,
        Arc::clone(&manager),
        cancel.child_token(),
    ));

    wait_for_shutdown().await;
    info!("shutdown signal received, stopping daemon...");
    cancel.cancel();

    manager.shutdown().await;
    let _ = accept_task.await;
    let _ = reporter_task.await;

    // Every sink handle must be gone before the broker writer can
    // drain its queue and exit
    drop(manager);
    if let Some(task) = writer_task {
        if timeout(Duration::from_secs(10), task).await.is_err() {
            warn!("broker writer still draining at exit");
        }
    }

    info!("daemon stopped");
    Ok(())
}

type WriterTask = JoinHandle<SinkMetricsSnapshot>;

/// Build the configured sink, its writer task, and its metrics provider
fn build_sink(
    config: &Config,
) -> (
    Arc<dyn Sink>,
    Option<WriterTask>,
    Option<Arc<dyn SinkMetricsProvider>>,
) {
    match config.sink.kind {
        SinkKind::Broker => {
            let (sink, writer) = broker("broker", config.sink.clone());
            let provider = Arc::new(sink.metrics_handle()) as Arc<dyn SinkMetricsProvider>;
            (
                Arc::new(sink),
                Some(tokio::spawn(writer.run())),
                Some(provider),
            )
        }
        SinkKind::Null => {
            let sink = NullSink::new("null");
            let provider = Arc::new(sink.metrics_handle()) as Arc<dyn SinkMetricsProvider>;
            (Arc::new(sink), None, Some(provider))
        }
    }
}

/// Accept producer connections until cancelled
async fn accept_loop(
    listener: TcpListener,
    manager: Arc<SessionManager>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "producer connected");
                    tokio::spawn(handle_connection(
                        stream,
                        Arc::clone(&manager),
                        cancel.child_token(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }
}

/// Serve one producer connection
async fn handle_connection(
    mut stream: TcpStream,
    manager: Arc<SessionManager>,
    cancel: CancellationToken,
) {
    let peer = stream
        .peer_addr()
        .map(|p| p.to_string())
        .unwrap_or_else(|_| "unknown".into());

    let mut len_buf = [0u8; 4];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read_exact(&mut len_buf) => {
                match read {
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "request read failed");
                        break;
                    }
                }

                let len = u32::from_be_bytes(len_buf) as usize;
                if len == 0 || len > MAX_REQUEST {
                    warn!(peer = %peer, len, "malformed request length, closing");
                    break;
                }

                let mut body = vec![0u8; len];
                if let Err(e) = stream.read_exact(&mut body).await {
                    warn!(peer = %peer, error = %e, "request body read failed");
                    break;
                }

                let status = process_request(&manager, &body).await;
                if let Err(e) = stream.write_all(&[status]).await {
                    warn!(peer = %peer, error = %e, "response write failed");
                    break;
                }
            }
        }
    }
    debug!(peer = %peer, "producer disconnected");
}

/// Dispatch one control request
async fn process_request(manager: &SessionManager, body: &[u8]) -> u8 {
    let Some((&opcode, rest)) = body.split_first() else {
        return STATUS_ERROR;
    };

    match opcode {
        OP_OPEN => {
            let Some((handle, sizes)) = parse_open(rest) else {
                return STATUS_ERROR;
            };
            match manager.open(handle, &sizes) {
                Ok(()) => STATUS_OK,
                Err(e) => {
                    warn!(session = %handle, error = %e, "open rejected");
                    STATUS_ERROR
                }
            }
        }
        OP_WRITE => {
            let Some((handle, payload)) = parse_handle(rest) else {
                return STATUS_ERROR;
            };
            match manager.write(handle, payload) {
                Ok(true) => STATUS_OK,
                Ok(false) => STATUS_DROPPED,
                Err(e) => {
                    debug!(session = %handle, error = %e, "write rejected");
                    STATUS_ERROR
                }
            }
        }
        OP_CLOSE => {
            let Some((handle, rest)) = parse_handle(rest) else {
                return STATUS_ERROR;
            };
            if !rest.is_empty() {
                return STATUS_ERROR;
            }
            match manager.close(handle).await {
                Ok(_) => STATUS_OK,
                // The session is gone from the registry either way
                Err(e @ PipelineError::ShutdownTimeout { .. }) => {
                    warn!(session = %handle, error = %e, "close timed out");
                    STATUS_ERROR
                }
                Err(e) => {
                    debug!(session = %handle, error = %e, "close rejected");
                    STATUS_ERROR
                }
            }
        }
        _ => STATUS_ERROR,
    }
}

/// Parse an OPEN body: handle, declared record size count, sizes
fn parse_open(body: &[u8]) -> Option<(SessionHandle, Vec<usize>)> {
    let (handle, rest) = parse_handle(body)?;
    if rest.len() < 2 {
        return None;
    }
    let count = u16::from_be_bytes([rest[0], rest[1]]) as usize;
    let sizes_bytes = &rest[2..];
    if sizes_bytes.len() != count * 4 {
        return None;
    }

    let sizes = sizes_bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]) as usize)
        .collect();
    Some((handle, sizes))
}

/// Split a body into its leading session handle and the remainder
fn parse_handle(body: &[u8]) -> Option<(SessionHandle, &[u8])> {
    if body.len() < 8 {
        return None;
    }
    let (head, rest) = body.split_at(8);
    let raw = u64::from_be_bytes([
        head[0], head[1], head[2], head[3], head[4], head[5], head[6], head[7],
    ]);
    Some((SessionHandle::new(raw), rest))
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
#[path = "serve_test.rs"]
mod serve_test;
