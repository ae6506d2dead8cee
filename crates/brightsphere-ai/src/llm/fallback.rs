//! Sequential provider fallback chain.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use crate::error::Result;
use crate::llm::client::{CompletionRequest, DeltaStream, LlmClient};

/// Reply used when every provider in the chain fails.
pub const DEFAULT_CANNED_REPLY: &str =
    "I'm having trouble reaching my tutors right now. Please try again in a moment.";

/// Ordered list of providers tried until one succeeds.
///
/// A provider that fails before producing any output is skipped; once a
/// streamed reply has started, its errors propagate to the caller. When every
/// provider fails, the canned reply is returned as a normal completion.
pub struct FallbackChain {
    providers: Vec<Arc<dyn LlmClient>>,
    canned_reply: String,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn LlmClient>>) -> Self {
        Self {
            providers,
            canned_reply: DEFAULT_CANNED_REPLY.to_string(),
        }
    }

    pub fn with_canned_reply(mut self, reply: impl Into<String>) -> Self {
        self.canned_reply = reply.into();
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in the order they will be tried.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider()).collect()
    }
}

#[async_trait]
impl LlmClient for FallbackChain {
    fn provider(&self) -> &str {
        "fallback"
    }

    fn model(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.model())
            .unwrap_or("canned")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        for provider in &self.providers {
            match provider.complete(request.clone()).await {
                Ok(text) => {
                    tracing::debug!(provider = provider.provider(), "completion served");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.provider(),
                        error = %e,
                        "provider failed, trying next"
                    );
                }
            }
        }
        Ok(self.canned_reply.clone())
    }

    fn complete_stream(&self, request: CompletionRequest) -> DeltaStream {
        let providers = self.providers.clone();
        let canned = self.canned_reply.clone();

        Box::pin(async_stream::stream! {
            for provider in providers {
                // Completion-only providers serve their reply as one delta.
                if !provider.supports_streaming() {
                    match provider.complete(request.clone()).await {
                        Ok(text) => {
                            yield Ok(text);
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(
                                provider = provider.provider(),
                                error = %e,
                                "provider failed, trying next"
                            );
                            continue;
                        }
                    }
                }

                let deltas = provider.complete_stream(request.clone());
                futures::pin_mut!(deltas);

                // Peek at the first item: a failure here means the provider
                // never started a reply, so the next one can be tried.
                match deltas.next().await {
                    None => return,
                    Some(Err(e)) => {
                        tracing::warn!(
                            provider = provider.provider(),
                            error = %e,
                            "provider failed before streaming, trying next"
                        );
                    }
                    Some(Ok(first)) => {
                        yield Ok(first);
                        while let Some(delta) = deltas.next().await {
                            yield delta;
                        }
                        return;
                    }
                }
            }
            yield Ok(canned);
        })
    }
}
