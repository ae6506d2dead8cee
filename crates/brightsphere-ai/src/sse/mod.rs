//! Incremental chat stream reader.
//!
//! Converts a chunked `text/event-stream` response body into an ordered,
//! finite sequence of reply text deltas: [`SseFrameDecoder`] handles framing
//! and the requeue policy for frames split mid-JSON, [`content_delta`] pulls
//! the text out of a chat-completion frame, and [`delta_stream`] ties both to
//! an async byte stream.

mod decoder;
mod stream;

pub use decoder::{DEFAULT_MAX_BUFFERED_BYTES, SseFrame, SseFrameDecoder};
pub use stream::{StreamOptions, delta_stream, frame_stream};

use serde_json::Value;

/// Extract the text delta from a chat-completion frame.
///
/// Reads `choices[0].delta.content`; anything else (role markers, empty
/// deltas, unrelated shapes) is a non-text event and yields `None`.
pub fn content_delta(frame: &Value) -> Option<&str> {
    frame
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
