//! Deterministic scripted client for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::conversation::Role;
use crate::error::{AiError, Result};
use crate::llm::client::{CompletionRequest, DeltaStream, LlmClient};

/// Scripted outcome for one completion.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant reply.
    Text(String),
    /// Stream the reply as the given deltas.
    Deltas(Vec<String>),
    /// Fail with an LLM error.
    Error(String),
    /// Fail like a timed-out request, after an optional delay.
    Timeout,
}

/// One scripted step with an optional delay before it resolves.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn deltas(parts: Vec<impl Into<String>>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Deltas(parts.into_iter().map(Into::into).collect()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn timeout(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            kind: MockStepKind::Timeout,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock provider driven by scripted steps.
///
/// With an empty script it echoes the latest user message, so it can also
/// stand in as an always-succeeding terminal provider in a fallback chain.
#[derive(Debug, Clone)]
pub struct MockLlmClient {
    model: String,
    streaming: bool,
    script: Arc<Mutex<VecDeque<MockStep>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            streaming: true,
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..Self::new(model)
        }
    }

    /// Report `supports_streaming() == false`, like a completion-only
    /// provider.
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn echo_reply(request: &CompletionRequest) -> String {
        request
            .messages
            .iter()
            .rev()
            .find(|msg| msg.role == Role::User)
            .map(|msg| format!("mock-echo: {}", msg.content))
            .unwrap_or_else(|| "mock-ok".to_string())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let Some(step) = self.next_step().await else {
            return Ok(Self::echo_reply(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(content),
            MockStepKind::Deltas(parts) => Ok(parts.concat()),
            MockStepKind::Error(message) => Err(AiError::Llm(message)),
            MockStepKind::Timeout => Err(AiError::Llm("mock timeout".to_string())),
        }
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn complete_stream(&self, request: CompletionRequest) -> DeltaStream {
        let client = self.clone();
        Box::pin(try_stream! {
            match client.next_step().await {
                None => yield Self::echo_reply(&request),
                Some(step) => {
                    if step.delay_ms > 0 {
                        sleep(Duration::from_millis(step.delay_ms)).await;
                    }

                    match step.kind {
                        MockStepKind::Text(content) => yield content,
                        MockStepKind::Deltas(parts) => {
                            for part in parts {
                                yield part;
                            }
                        }
                        MockStepKind::Error(message) => Err(AiError::Llm(message))?,
                        MockStepKind::Timeout => Err(AiError::Llm("mock timeout".to_string()))?,
                    }
                }
            }
        })
    }
}
