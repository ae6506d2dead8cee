//! OpenAI-compatible chat-completions provider.
//!
//! Also covers xAI (Grok) and other services exposing the same wire protocol
//! through [`OpenAiClient::with_base_url`].

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Role;
use crate::error::{AiError, Result};
use crate::llm::build_http_client;
use crate::llm::client::{CompletionRequest, DeltaStream, LlmClient};
use crate::llm::retry::{RetryPolicy, response_to_error};
use crate::sse::{StreamOptions, delta_stream};

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: String,
    retry: RetryPolicy,
    stream_options: StreamOptions,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            provider: "openai".to_string(),
            retry: RetryPolicy::default(),
            stream_options: StreamOptions::default(),
        }
    }

    /// Client for the xAI (Grok) endpoint, which speaks the same protocol.
    pub fn grok(api_key: impl Into<String>) -> Self {
        let mut client = Self::new(api_key);
        client.provider = "grok".to_string();
        client.model = "grok-2-latest".to_string();
        client.base_url = "https://api.x.ai/v1".to_string();
        client
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom base URL (for API-compatible services)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<WireMessage> = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": stream,
        })
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = self.request_body(&request, false);
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            let response = match self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    let error = AiError::Http(e);
                    if !error.is_retryable() || attempt == self.retry.max_retries {
                        return Err(error);
                    }
                    let delay = self.retry.delay_for(attempt + 1, None);
                    tracing::warn!(
                        provider = %self.provider,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after connection error"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(error);
                    continue;
                }
            };

            if response.status().is_success() {
                let data: ChatResponse = response.json().await?;
                return data
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| {
                        AiError::Llm(format!("{} returned an empty completion", self.provider))
                    });
            }

            let error = response_to_error(response, &self.provider).await;
            if !error.is_retryable() || attempt == self.retry.max_retries {
                return Err(error);
            }
            let delay = self.retry.delay_for(attempt + 1, error.retry_after());
            tracing::warn!(
                provider = %self.provider,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "retrying after provider error"
            );
            tokio::time::sleep(delay).await;
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| {
            AiError::Llm(format!("{} request failed after retries", self.provider))
        }))
    }

    fn complete_stream(&self, request: CompletionRequest) -> DeltaStream {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let url = format!("{}/chat/completions", self.base_url);
        let provider = self.provider.clone();
        let body = self.request_body(&request, true);
        let options = self.stream_options.clone();

        Box::pin(async_stream::stream! {
            let response = match client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    yield Err(AiError::Http(e));
                    return;
                }
            };

            if !response.status().is_success() {
                yield Err(response_to_error(response, &provider).await);
                return;
            }

            let deltas = delta_stream(response.bytes_stream(), options);
            futures::pin_mut!(deltas);
            while let Some(delta) = deltas.next().await {
                yield delta;
            }
        })
    }
}
