//! Outbound buffer shared by every room, flushed on size, line count or idle time.

use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle, time};
use tracing::{debug, info};

use crate::{config::Config, delivery::DeliveryClient};

/// Collector messages max out at 2000 characters; keep headroom for the join newlines.
pub const MESSAGE_BYTE_CAP: usize = 1800;

#[derive(Debug, Clone)]
pub struct FlushPolicy {
    pub max_bytes:  usize,
    pub max_lines:  usize,
    /// `None` turns the idle timer off.
    pub idle:       Option<Duration>,
    /// `false` in files-only mode: batches are dropped instead of sent.
    pub relay_text: bool,
}

impl FlushPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_bytes:  MESSAGE_BYTE_CAP,
            max_lines:  cfg.max_buffer_lines,
            idle:       cfg.idle_flush,
            relay_text: cfg.relay_text(),
        }
    }
}

#[derive(Debug, Default)]
pub struct OutboundBuffer {
    lines: Vec<String>,
    bytes: usize,
}

impl OutboundBuffer {
    pub fn push(&mut self, line: String) {
        self.bytes += line.len();
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Size of the batch once joined with `\n`.
    pub fn serialized_len(&self) -> usize {
        self.bytes + self.lines.len().saturating_sub(1)
    }

    /// Size after pushing `line`, join newline included.
    pub fn len_with(&self, line: &str) -> usize {
        if self.lines.is_empty() { line.len() } else { self.serialized_len() + 1 + line.len() }
    }

    fn take(&mut self) -> Vec<String> {
        self.bytes = 0;
        std::mem::take(&mut self.lines)
    }
}

struct Inner {
    delivery: DeliveryClient,
    policy:   FlushPolicy,
    buffer:   Mutex<OutboundBuffer>,
    idle:     Mutex<Option<JoinHandle<()>>>,
    /* 一次只送一批；shutdown 也要等進行中的那批 */
    sending:  Mutex<()>,
}

#[derive(Clone)]
pub struct FlushScheduler {
    inner: Arc<Inner>,
}

impl FlushScheduler {
    pub fn new(delivery: DeliveryClient, policy: FlushPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                delivery,
                policy,
                buffer:  Mutex::new(OutboundBuffer::default()),
                idle:    Mutex::new(None),
                sending: Mutex::new(()),
            }),
        }
    }

    pub async fn buffered(&self) -> usize {
        self.inner.buffer.lock().await.len()
    }

    pub async fn push(&self, line: String) {
        // the pending batch goes out alone rather than overshoot the collector limit
        let overflow = {
            let buf = self.inner.buffer.lock().await;
            !buf.lines.is_empty() && buf.len_with(&line) > self.inner.policy.max_bytes
        };
        if overflow {
            self.flush().await;
        }

        let full = {
            let mut buf = self.inner.buffer.lock().await;
            buf.push(line);
            buf.serialized_len() >= self.inner.policy.max_bytes || buf.len() >= self.inner.policy.max_lines
        };
        if full {
            self.cancel_idle().await;
            self.flush().await;
        } else {
            self.arm_idle().await;
        }
    }

    /// Swaps the buffer out, then hands the batch to the delivery client.
    /// Lines pushed while the request is in flight start the next batch.
    /// Batches go out one at a time, in order.
    pub async fn flush(&self) {
        let _sending = self.inner.sending.lock().await;
        let lines = self.inner.buffer.lock().await.take();
        if lines.is_empty() {
            return;
        }
        if !self.inner.policy.relay_text {
            debug!(lines = lines.len(), "files-only mode, batch not relayed");
            return;
        }
        info!(lines = lines.len(), "flushing chat batch");
        self.inner.delivery.send_batch(&lines.join("\n")).await;
    }

    /// Stops the idle timer, waits out a send already in flight, then
    /// flushes whatever is left.
    pub async fn shutdown(&self) {
        self.cancel_idle().await;
        self.flush().await;
    }

    async fn arm_idle(&self) {
        let Some(delay) = self.inner.policy.idle else { return };
        let this = self.clone();
        let timer = tokio::spawn(async move {
            time::sleep(delay).await;
            // detached: re-arming aborts the timer, never a send already under way;
            // shutdown still waits for it through the `sending` lock
            tokio::spawn(async move { this.flush().await });
        });
        if let Some(old) = self.inner.idle.lock().await.replace(timer) {
            old.abort();
        }
    }

    async fn cancel_idle(&self) {
        if let Some(timer) = self.inner.idle.lock().await.take() {
            timer.abort();
        }
    }
}
