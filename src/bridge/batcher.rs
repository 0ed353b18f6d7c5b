//! Output batching for terminal streams
//!
//! Chunks carrying control bytes go out immediately so escape sequences reach
//! the terminal intact and interactive echo stays snappy. Plain bulk output is
//! coalesced until a size threshold or the periodic flush tick.
//!
//! The state machine here has no timers; the multiplexer drives
//! [`OutputBatcher::flush_on_tick`] from its own interval.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Batching thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    /// Leading buffered bytes inspected for control content
    #[serde(default = "default_scan_window")]
    pub scan_window: usize,
    /// Plain output is flushed once the buffer reaches this size
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,
    /// Hard cap on buffered bytes
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Period of the latency-bounding flush tick
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_scan_window() -> usize {
    100
}

fn default_flush_threshold() -> usize {
    256
}

fn default_max_batch() -> usize {
    2048
}

fn default_flush_interval_ms() -> u64 {
    8
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            scan_window: default_scan_window(),
            flush_threshold: default_flush_threshold(),
            max_batch: default_max_batch(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl BatchPolicy {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}

/// Control-like byte: C0 controls except tab/LF/CR, which includes ESC
#[inline]
fn is_control(byte: u8) -> bool {
    byte < 0x20 && !matches!(byte, b'\t' | b'\n' | b'\r')
}

/// Accumulation buffer with the flush policy applied on every append
#[derive(Debug)]
pub struct OutputBatcher {
    policy: BatchPolicy,
    buffer: BytesMut,
}

impl OutputBatcher {
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            buffer: BytesMut::with_capacity(policy.max_batch),
        }
    }

    /// Add a chunk; returns a batch when the policy says flush now
    pub fn append(&mut self, chunk: &[u8]) -> Option<Bytes> {
        if chunk.is_empty() {
            return None;
        }
        self.buffer.extend_from_slice(chunk);

        let len = self.buffer.len();
        if self.has_control() || len >= self.policy.flush_threshold || len >= self.policy.max_batch {
            Some(self.take())
        } else {
            None
        }
    }

    /// Periodic flush of whatever is pending
    pub fn flush_on_tick(&mut self) -> Option<Bytes> {
        (!self.buffer.is_empty()).then(|| self.take())
    }

    /// Final flush at end of stream
    pub fn drain(&mut self) -> Option<Bytes> {
        self.flush_on_tick()
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn has_control(&self) -> bool {
        let window = self.buffer.len().min(self.policy.scan_window);
        self.buffer[..window].iter().copied().any(is_control)
    }

    fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}
