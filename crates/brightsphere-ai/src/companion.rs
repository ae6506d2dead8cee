//! Drives one conversation against a provider, folding streamed deltas.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::coalesce::DeltaCoalescer;
use crate::conversation::Conversation;
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient};

/// Receiver for UI-facing stream notifications.
#[async_trait]
pub trait DeltaSink: Send {
    async fn on_delta(&mut self, text: &str);
    async fn on_complete(&mut self);
}

/// Sink that discards everything.
pub struct NullSink;

#[async_trait]
impl DeltaSink for NullSink {
    async fn on_delta(&mut self, _text: &str) {}
    async fn on_complete(&mut self) {}
}

/// Companion notification forwarded to a UI channel.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionEvent {
    Delta(String),
    Complete,
}

/// Sink forwarding notifications over an mpsc channel.
pub struct ChannelSink {
    tx: mpsc::Sender<CompanionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<CompanionEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DeltaSink for ChannelSink {
    async fn on_delta(&mut self, text: &str) {
        let _ = self.tx.send(CompanionEvent::Delta(text.to_string())).await;
    }

    async fn on_complete(&mut self) {
        let _ = self.tx.send(CompanionEvent::Complete).await;
    }
}

/// Chat companion: one conversation bound to a provider, usually a
/// [`FallbackChain`](crate::llm::FallbackChain).
pub struct Companion {
    client: Arc<dyn LlmClient>,
    conversation: Conversation,
    coalescer: Option<DeltaCoalescer>,
}

impl Companion {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            conversation: Conversation::new(),
            coalescer: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation = Conversation::with_system_prompt(prompt);
        self
    }

    /// Batch sink notifications instead of emitting one per token.
    pub fn with_coalescing(mut self, coalescer: DeltaCoalescer) -> Self {
        self.coalescer = Some(coalescer);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Send one user message and stream the reply into the conversation,
    /// notifying the sink as text arrives. Returns the full reply text.
    ///
    /// On a stream error the partial reply stays in the conversation and the
    /// error propagates to the caller.
    pub async fn send(&mut self, text: impl Into<String>, sink: &mut dyn DeltaSink) -> Result<String> {
        self.conversation.push_user(text);
        let request = CompletionRequest::new(self.conversation.messages().to_vec());

        let mut deltas = self.client.complete_stream(request);
        let outcome = loop {
            match deltas.next().await {
                Some(Ok(delta)) => {
                    self.conversation.apply_delta(&delta);
                    match &mut self.coalescer {
                        Some(coalescer) => {
                            if let Some(batched) = coalescer.push(&delta) {
                                sink.on_delta(&batched).await;
                            }
                        }
                        None => sink.on_delta(&delta).await,
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };

        if let Some(coalescer) = &mut self.coalescer
            && let Some(rest) = coalescer.flush()
        {
            sink.on_delta(&rest).await;
        }

        let reply = self.conversation.in_progress().unwrap_or_default().to_string();
        self.conversation.finish_assistant();
        sink.on_complete().await;

        outcome.map(|_| reply)
    }
}
