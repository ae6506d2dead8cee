//! LLM client trait and request types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::conversation::Message;
use crate::error::Result;

/// Ordered, finite stream of reply text deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Chat completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a new completion request
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }
}

/// Chat-completion provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs and failover diagnostics.
    fn provider(&self) -> &str;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;

    /// Complete a request and return the full reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Stream the reply as ordered text deltas.
    fn complete_stream(&self, request: CompletionRequest) -> DeltaStream;

    fn supports_streaming(&self) -> bool {
        true
    }
}
