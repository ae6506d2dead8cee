//! BrightSphere AI - streaming chat companion core
//!
//! This crate provides:
//! - Incremental SSE reader for chat-completion streams
//! - Multi-provider LLM client (OpenAI, Grok, Claude)
//! - Provider fallback chain with a canned last-resort reply
//! - Conversation transcript that folds streamed deltas in place
//! - Companion driver wiring a provider chain to a UI sink

pub mod coalesce;
pub mod companion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod sse;

// Re-export commonly used types
pub use coalesce::DeltaCoalescer;
pub use companion::{ChannelSink, Companion, CompanionEvent, DeltaSink, NullSink};
pub use config::ProviderSettings;
pub use conversation::{Conversation, Message, Role};
pub use error::{AiError, Result};
pub use llm::{
    AnthropicClient, CompletionRequest, DeltaStream, FallbackChain, LlmClient, MockLlmClient,
    MockStep, OpenAiClient, RetryPolicy,
};
pub use sse::{SseFrame, SseFrameDecoder, StreamOptions, content_delta, delta_stream};
