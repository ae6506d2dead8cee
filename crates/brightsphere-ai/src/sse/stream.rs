//! Async adapters from raw byte chunks to ordered frame/delta streams.

use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::{AiError, Result};
use crate::sse::content_delta;
use crate::sse::decoder::{DEFAULT_MAX_BUFFERED_BYTES, SseFrame, SseFrameDecoder};

/// Tuning for [`frame_stream`] and [`delta_stream`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Give up if no chunk arrives within this window. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Hard cap on bytes buffered while waiting for a complete frame.
    pub max_buffered_bytes: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
        }
    }
}

impl StreamOptions {
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

/// Decode an SSE byte stream into parsed frames.
///
/// Ends after yielding [`SseFrame::Done`], when the underlying stream ends
/// (a missing sentinel is treated as normal completion), or with one terminal
/// `Err` item for transport, timeout, or decode failures.
pub fn frame_stream<S, B, E>(
    bytes: S,
    options: StreamOptions,
) -> impl Stream<Item = Result<SseFrame>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let mut decoder = SseFrameDecoder::new(options.max_buffered_bytes);
        futures::pin_mut!(bytes);
        loop {
            let next = match options.idle_timeout {
                Some(window) => match tokio::time::timeout(window, bytes.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        yield Err(AiError::IdleTimeout(window));
                        return;
                    }
                },
                None => bytes.next().await,
            };

            let Some(chunk) = next else {
                if let Some(err) = decoder.take_overflow() {
                    yield Err(err);
                }
                return;
            };
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(AiError::Transport(e.to_string()));
                    return;
                }
            };

            let frames = match decoder.feed(chunk.as_ref()) {
                Ok(frames) => frames,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for frame in frames {
                let done = frame == SseFrame::Done;
                yield Ok(frame);
                if done {
                    return;
                }
            }
        }
    }
}

/// Decode an SSE byte stream into text deltas (`choices[0].delta.content`).
///
/// Frames without a content delta are skipped; the sentinel and stream end
/// both terminate the sequence successfully.
pub fn delta_stream<S, B, E>(
    bytes: S,
    options: StreamOptions,
) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let frames = frame_stream(bytes, options);
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(SseFrame::Event(value)) => {
                    if let Some(delta) = content_delta(&value) {
                        yield Ok(delta.to_string());
                    }
                }
                Ok(SseFrame::Done) => return,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Chunk = std::result::Result<Vec<u8>, std::io::Error>;

    fn chunks(parts: &[&str]) -> Vec<Chunk> {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    async fn collect(items: Vec<Chunk>, options: StreamOptions) -> Vec<Result<String>> {
        let stream = delta_stream(futures::stream::iter(items), options);
        stream.collect::<Vec<_>>().await
    }

    fn ok_deltas(results: Vec<Result<String>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn same_deltas_regardless_of_chunking() {
        let payload = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n",
            "data: [DONE]\n",
        );

        let single = ok_deltas(collect(chunks(&[payload]), StreamOptions::default()).await);

        let split: Vec<Chunk> = payload
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        let fragmented = ok_deltas(collect(split, StreamOptions::default()).await);

        assert_eq!(single, fragmented);
        assert_eq!(single.concat(), "Hello");
    }

    #[tokio::test]
    async fn json_split_across_chunks_emits_one_delta() {
        let items = chunks(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel",
            "lo\"}}]}\n",
        ]);
        let deltas = ok_deltas(collect(items, StreamOptions::default()).await);
        assert_eq!(deltas, vec!["Hello"]);
    }

    #[tokio::test]
    async fn transport_error_surfaces_as_terminal_err() {
        let items: Vec<Chunk> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
        ];
        let results = collect(items, StreamOptions::default()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_deref().unwrap(), "partial");
        assert!(matches!(results[1], Err(AiError::Transport(_))));
    }

    #[tokio::test]
    async fn stream_end_without_sentinel_is_normal_completion() {
        let items = chunks(&["data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n"]);
        let results = collect(items, StreamOptions::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_deref().unwrap(), "hi");
    }

    #[tokio::test]
    async fn deltas_arriving_with_an_oversized_line_still_surface() {
        let payload = format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"hi\"}}}}]}}\ndata: {{\"junk\":{}\n",
            "x".repeat(128)
        );
        let options = StreamOptions {
            max_buffered_bytes: 64,
            ..StreamOptions::default()
        };
        let results = collect(chunks(&[&payload]), options).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_deref().unwrap(), "hi");
        assert!(matches!(results[1], Err(AiError::FrameTooLarge { limit: 64 })));
    }

    #[tokio::test]
    async fn idle_timeout_fails_a_stalled_stream() {
        let stalled = futures::stream::pending::<Chunk>();
        let options = StreamOptions::default().with_idle_timeout(Duration::from_millis(20));
        let stream = delta_stream(stalled, options);
        futures::pin_mut!(stream);
        let first = stream.next().await.expect("timeout item");
        assert!(matches!(first, Err(AiError::IdleTimeout(_))));
        assert!(stream.next().await.is_none());
    }
}
