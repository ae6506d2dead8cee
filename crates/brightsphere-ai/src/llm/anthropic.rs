//! Anthropic messages API provider.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use crate::conversation::Role;
use crate::error::{AiError, Result};
use crate::llm::build_http_client;
use crate::llm::client::{CompletionRequest, DeltaStream, LlmClient};
use crate::llm::retry::response_to_error;
use crate::sse::{SseFrame, StreamOptions, frame_stream};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    stream_options: StreamOptions,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            api_key: api_key.into(),
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            stream_options: StreamOptions::default(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for proxies and tests)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        // The messages API takes the system prompt as a top-level field.
        let system = request
            .messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone());

        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": if m.role == Role::Assistant { "assistant" } else { "user" },
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "system": system,
            "messages": messages,
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    fn messages_request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }
}

/// Streaming event subset: text deltas and terminal events. Everything else
/// (pings, block boundaries, usage) is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: ErrorPayload,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = self.request_body(&request, false);
        let response = self.messages_request(&body).send().await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, "anthropic").await);
        }

        let data: MessagesResponse = response.json().await?;
        let text: String = data
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if text.is_empty() {
            Err(AiError::Llm(
                "anthropic returned an empty completion".to_string(),
            ))
        } else {
            Ok(text)
        }
    }

    fn complete_stream(&self, request: CompletionRequest) -> DeltaStream {
        let body = self.request_body(&request, true);
        let builder = self.messages_request(&body);
        let options = self.stream_options.clone();

        Box::pin(async_stream::stream! {
            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    yield Err(AiError::Http(e));
                    return;
                }
            };

            if !response.status().is_success() {
                yield Err(response_to_error(response, "anthropic").await);
                return;
            }

            let frames = frame_stream(response.bytes_stream(), options);
            futures::pin_mut!(frames);
            while let Some(frame) = frames.next().await {
                let value = match frame {
                    Ok(SseFrame::Event(value)) => value,
                    Ok(SseFrame::Done) => return,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                match serde_json::from_value::<StreamEvent>(value) {
                    Ok(StreamEvent::ContentBlockDelta {
                        delta: BlockDelta::TextDelta { text },
                    }) => {
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Ok(StreamEvent::MessageStop) => return,
                    Ok(StreamEvent::Error { error }) => {
                        yield Err(AiError::Llm(format!(
                            "anthropic stream error: {}",
                            error.message
                        )));
                        return;
                    }
                    // Unknown event shapes are non-text events.
                    Ok(_) | Err(_) => {}
                }
            }
        })
    }
}
