//! Incremental decoder for `data:`-framed server-sent event streams.
//!
//! Input arrives as arbitrary byte chunks: a multi-byte codepoint, a line, or
//! a JSON payload may all be split across reads. The decoder carries the
//! undecoded tail between feeds and never loses bytes at a chunk boundary.

use serde_json::Value;

use crate::error::{AiError, Result};

/// Default cap on bytes buffered while waiting for a complete frame.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 256 * 1024;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// A `data:` line whose payload parsed as JSON.
    Event(Value),
    /// The `[DONE]` sentinel. No further frames follow.
    Done,
}

enum LineOutcome {
    Skip,
    Event(Value),
    Done,
    Requeue,
}

/// Stateful SSE decoder fed with raw byte chunks.
///
/// A line whose payload fails to parse as JSON is assumed to be a frame split
/// mid-payload by an upstream proxy: the line is pushed back in front of the
/// remaining buffer and scanning resumes on the next feed. Buffering is
/// bounded; a line that never becomes parseable is a hard error rather than
/// an unbounded buffer.
#[derive(Debug)]
pub struct SseFrameDecoder {
    /// Decoded text not yet consumed as complete lines.
    text: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the previous feed.
    partial: Vec<u8>,
    max_buffered: usize,
    finished: bool,
    /// The buffer cap tripped after frames were already completed; the error
    /// is reported on the next feed so those frames are not lost.
    overflowed: bool,
}

impl Default for SseFrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFERED_BYTES)
    }
}

impl SseFrameDecoder {
    pub fn new(max_buffered: usize) -> Self {
        Self {
            text: String::new(),
            partial: Vec::new(),
            max_buffered,
            finished: false,
            overflowed: false,
        }
    }

    /// Whether the `[DONE]` sentinel was seen or decoding failed terminally.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk; returns every frame completed by it, in order.
    ///
    /// After the sentinel (or an error) further feeds return no frames.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>> {
        let mut frames = Vec::new();
        if self.finished {
            if let Some(err) = self.take_overflow() {
                return Err(err);
            }
            return Ok(frames);
        }

        self.decode_utf8(chunk);

        while let Some(pos) = self.text.find('\n') {
            let mut line: String = self.text.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            match classify_line(&line) {
                LineOutcome::Skip => {}
                LineOutcome::Event(value) => frames.push(SseFrame::Event(value)),
                LineOutcome::Done => {
                    self.finished = true;
                    self.text.clear();
                    self.partial.clear();
                    frames.push(SseFrame::Done);
                    return Ok(frames);
                }
                LineOutcome::Requeue => {
                    // Assume the newline was spurious: restore the line in
                    // front of the rest and wait for more bytes.
                    line.push_str(&self.text);
                    self.text = line;
                    break;
                }
            }
        }

        if self.text.len() + self.partial.len() > self.max_buffered {
            self.finished = true;
            if frames.is_empty() {
                return Err(AiError::FrameTooLarge {
                    limit: self.max_buffered,
                });
            }
            // Deliver what already parsed; the error surfaces next feed.
            self.overflowed = true;
        }

        Ok(frames)
    }

    /// The deferred buffer-cap error, if the cap tripped after frames had
    /// already been completed in the same feed.
    pub fn take_overflow(&mut self) -> Option<AiError> {
        if self.overflowed {
            self.overflowed = false;
            Some(AiError::FrameTooLarge {
                limit: self.max_buffered,
            })
        } else {
            None
        }
    }

    /// Append a chunk to the text buffer, keeping any incomplete trailing
    /// codepoint as raw bytes for the next feed.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        let mut bytes = std::mem::take(&mut self.partial);
        loop {
            match std::str::from_utf8(&bytes) {
                Ok(s) => {
                    self.text.push_str(s);
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text.push_str(&String::from_utf8_lossy(&bytes[..valid]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for the rest.
                        None => {
                            self.partial = bytes[valid..].to_vec();
                            return;
                        }
                        // Genuinely invalid bytes mid-stream.
                        Some(skip) => {
                            self.text.push('\u{FFFD}');
                            bytes.drain(..valid + skip);
                        }
                    }
                }
            }
        }
    }
}

fn classify_line(line: &str) -> LineOutcome {
    if line.is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return LineOutcome::Done;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => LineOutcome::Event(value),
        Err(_) => LineOutcome::Requeue,
    }
}
