//! Consume command - broker-side processing daemon
//!
//! Connects to the broker, reads persisted messages, and re-publishes
//! validated trace messages under the output key. Only messages carrying
//! the configured input key are trusted: a buffer published under a
//! foreign key is skipped without being decoded.

use std::io::{self, ErrorKind};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Args;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracepipe_config::{Config, ConsumerConfig};
use tracepipe_protocol::{ProtocolError, RecordIter};
use tracepipe_sinks::{broker, decode_frame_body, send_with_retry, BrokerSink, RetryPolicy};
use tracing::{debug, info, warn};

/// Messages larger than this are treated as stream corruption
const MAX_MESSAGE: usize = 64 << 20;

/// Arguments for the consume command
#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Default)]
struct ConsumeStats {
    processed: u64,
    skipped: u64,
    invalid: u64,
}

/// Run the consumer until SIGINT or the broker closes the stream
pub async fn run(args: ConsumeArgs) -> Result<()> {
    let config = Config::from_file(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    crate::init_logging(&config.log, args.log_level.as_deref())?;

    let consumer = config.consumer.clone();
    info!(
        source = %consumer.source,
        input_key = %consumer.input_key,
        output_key = %consumer.output_key,
        "consumer starting"
    );

    // Processed messages go back to the same broker under the output key
    let mut out_config = config.sink.clone();
    out_config.target = consumer.source.clone();
    let (out_sink, writer) = broker("consumer-out", out_config);
    let writer_task = tokio::spawn(writer.run());
    let retry = RetryPolicy::new(10, consumer.poll_budget);

    let mut stream = TcpStream::connect(&consumer.source)
        .await
        .with_context(|| format!("connecting to broker at {}", consumer.source))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _ = signal::ctrl_c().await;
            cancel.cancel();
        });
    }

    let mut stats = ConsumeStats::default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown signal received");
                break;
            }
            frame = read_message(&mut stream) => match frame {
                Ok(Some(body)) => {
                    handle_message(&consumer, &out_sink, &retry, &body, &mut stats).await;
                }
                Ok(None) => {
                    info!("broker closed the stream");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "broker read failed");
                    break;
                }
            },
        }
    }

    drop(out_sink);
    if timeout(Duration::from_secs(10), writer_task).await.is_err() {
        warn!("output writer still draining at exit");
    }

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        invalid = stats.invalid,
        "consumer stopped"
    );
    Ok(())
}

/// Read one length-prefixed message; None on a clean end of stream
async fn read_message(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 || len > MAX_MESSAGE {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("message length {len} out of range"),
        ));
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Filter, validate, and re-publish one broker message
async fn handle_message(
    consumer: &ConsumerConfig,
    out_sink: &BrokerSink,
    retry: &RetryPolicy,
    body: &[u8],
    stats: &mut ConsumeStats,
) {
    let Some((key, payload)) = decode_frame_body(body) else {
        stats.invalid += 1;
        warn!(bytes = body.len(), "unparseable broker frame");
        return;
    };

    if key != consumer.input_key {
        stats.skipped += 1;
        debug!(key, "foreign key, message ignored");
        return;
    }

    let records = match validate_records(payload) {
        Ok(count) => count,
        Err(e) => {
            stats.invalid += 1;
            warn!(error = %e, bytes = payload.len(), "corrupt trace message discarded");
            return;
        }
    };

    match send_with_retry(
        out_sink,
        retry,
        &consumer.output_key,
        Bytes::copy_from_slice(payload),
    )
    .await
    {
        Ok(busy) => {
            stats.processed += 1;
            debug!(records, busy_retries = busy, "message re-published");
        }
        Err(e) => {
            stats.invalid += 1;
            warn!(error = %e, "failed to re-publish message");
        }
    }
}

/// Count the records of a message, failing on a truncated stream
fn validate_records(payload: &[u8]) -> std::result::Result<usize, ProtocolError> {
    let mut count = 0;
    for record in RecordIter::new(payload) {
        record?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tracepipe_protocol::encode_record;

    #[test]
    fn test_validate_records_counts() {
        let mut buf = BytesMut::new();
        encode_record(&mut buf, b"a");
        encode_record(&mut buf, b"bc");

        assert_eq!(validate_records(&buf).unwrap(), 2);
        assert_eq!(validate_records(&[]).unwrap(), 0);
    }

    #[test]
    fn test_validate_records_rejects_truncation() {
        let mut buf = BytesMut::new();
        encode_record(&mut buf, b"whole");
        buf.extend_from_slice(&[9, 0, 0, 0, 1]); // claims 9 bytes, has 1

        assert!(validate_records(&buf).is_err());
    }
}
