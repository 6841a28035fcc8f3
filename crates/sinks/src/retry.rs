//! Retry loop for busy sinks
//!
//! A full sink queue is backpressure, not data loss: the caller polls the
//! sink so the queue can drain, then retries the send. Only after the
//! attempt budget is spent does the send fail, and it fails loudly with
//! [`SinkError::Backpressure`].

use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use crate::{Result, SendOutcome, Sink, SinkError};

/// Retry policy for Busy outcomes
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total send attempts before giving up
    pub max_attempts: usize,
    /// Poll budget granted to the sink between attempts
    pub poll_budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            poll_budget: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt count and poll budget
    pub fn new(max_attempts: usize, poll_budget: Duration) -> Self {
        Self {
            max_attempts,
            poll_budget,
        }
    }
}

/// Send a message, retrying while the sink reports Busy
///
/// Returns the number of Busy responses absorbed on success. A Fatal
/// outcome fails immediately with [`SinkError::Closed`]; spending every
/// attempt fails with [`SinkError::Backpressure`].
pub async fn send_with_retry(
    sink: &dyn Sink,
    policy: &RetryPolicy,
    key: &str,
    payload: Bytes,
) -> Result<usize> {
    let mut busy = 0usize;

    for attempt in 1..=policy.max_attempts.max(1) {
        match sink.try_send(key, payload.clone()) {
            SendOutcome::Accepted => return Ok(busy),
            SendOutcome::Fatal => return Err(SinkError::Closed),
            SendOutcome::Busy => {
                busy += 1;
                if attempt == policy.max_attempts.max(1) {
                    break;
                }
                debug!(
                    sink = sink.name(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    "sink busy, polling before retry"
                );
                sink.poll(policy.poll_budget).await;
            }
        }
    }

    Err(SinkError::Backpressure { attempts: busy })
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;
