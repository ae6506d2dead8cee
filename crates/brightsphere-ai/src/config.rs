//! Provider configuration from environment variables.

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{AnthropicClient, FallbackChain, LlmClient, OpenAiClient};
use crate::sse::StreamOptions;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const XAI_API_KEY_ENV: &str = "XAI_API_KEY";
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// API keys and stream tuning for the provider chain.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub xai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub idle_timeout: Option<Duration>,
}

impl ProviderSettings {
    /// Read settings from the process environment. Unset or blank
    /// variables leave the corresponding provider out of the chain.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_non_empty(OPENAI_API_KEY_ENV),
            openai_base_url: env_non_empty(OPENAI_BASE_URL_ENV),
            xai_api_key: env_non_empty(XAI_API_KEY_ENV),
            anthropic_api_key: env_non_empty(ANTHROPIC_API_KEY_ENV),
            idle_timeout: None,
        }
    }

    /// Abort a streaming reply when no bytes arrive for this long.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    fn stream_options(&self) -> StreamOptions {
        match self.idle_timeout {
            Some(timeout) => StreamOptions::default().with_idle_timeout(timeout),
            None => StreamOptions::default(),
        }
    }

    /// Build the fallback chain for every configured provider, in priority
    /// order: OpenAI, then Grok, then Claude.
    pub fn build_chain(&self) -> FallbackChain {
        let options = self.stream_options();
        let mut providers: Vec<Arc<dyn LlmClient>> = Vec::new();

        if let Some(key) = &self.openai_api_key {
            let mut client = OpenAiClient::new(key).with_stream_options(options.clone());
            if let Some(url) = &self.openai_base_url {
                client = client.with_base_url(url);
            }
            providers.push(Arc::new(client));
        }
        if let Some(key) = &self.xai_api_key {
            providers.push(Arc::new(
                OpenAiClient::grok(key).with_stream_options(options.clone()),
            ));
        }
        if let Some(key) = &self.anthropic_api_key {
            providers.push(Arc::new(
                AnthropicClient::new(key).with_stream_options(options),
            ));
        }

        if providers.is_empty() {
            tracing::warn!("No provider API keys configured, replies will be canned");
        }

        FallbackChain::new(providers)
    }
}
