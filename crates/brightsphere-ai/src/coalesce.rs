//! Flush throttling for streamed deltas.
//!
//! UI surfaces repaint per notification; coalescing batches token-sized
//! deltas so a reply does not trigger hundreds of updates.

use std::time::{Duration, Instant};

const DEFAULT_FLUSH_INTERVAL_MS: u64 = 300;
const DEFAULT_CHUNK_THRESHOLD: usize = 20;

/// Batches streamed deltas until a chunk-count or time threshold passes.
#[derive(Debug)]
pub struct DeltaCoalescer {
    pending: String,
    chunks: usize,
    last_flush: Instant,
    flush_interval: Duration,
    chunk_threshold: usize,
}

impl Default for DeltaCoalescer {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            DEFAULT_CHUNK_THRESHOLD,
        )
    }
}

impl DeltaCoalescer {
    pub fn new(flush_interval: Duration, chunk_threshold: usize) -> Self {
        Self {
            pending: String::new(),
            chunks: 0,
            last_flush: Instant::now(),
            flush_interval,
            chunk_threshold,
        }
    }

    /// Add one delta; returns the batched text when a threshold is crossed.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.pending.push_str(delta);
        self.chunks += 1;

        if self.chunks >= self.chunk_threshold
            || self.last_flush.elapsed() >= self.flush_interval
        {
            return self.flush();
        }

        None
    }

    /// Take whatever is pending, resetting the thresholds.
    pub fn flush(&mut self) -> Option<String> {
        self.chunks = 0;
        self.last_flush = Instant::now();
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}
