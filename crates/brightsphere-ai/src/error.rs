//! Error types for the companion library.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by stream decoding and provider calls.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} returned HTTP {status}: {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// The underlying byte stream failed mid-reply.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No bytes arrived within the configured idle window.
    #[error("Stream stalled for {0:?} without data")]
    IdleTimeout(Duration),

    /// A requeued SSE line kept growing past the buffer cap without ever
    /// becoming parseable.
    #[error("SSE frame exceeded {limit} buffered bytes")]
    FrameTooLarge { limit: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LlmHttp { status, .. } => {
                *status == 408 || *status == 429 || (500..=599).contains(status)
            }
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Transport(_) | Self::IdleTimeout(_) => true,
            Self::Llm(message) => {
                let lower = message.to_lowercase();
                lower.contains("rate limit")
                    || lower.contains("timeout")
                    || lower.contains("overloaded")
            }
            _ => false,
        }
    }

    /// Server-requested retry delay, if the provider sent one.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::LlmHttp {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for companion operations.
pub type Result<T> = std::result::Result<T, AiError>;
