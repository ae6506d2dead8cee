//! Multi-provider LLM client abstraction.

mod anthropic;
mod client;
mod fallback;
mod mock;
mod openai;
mod retry;

#[cfg(test)]
mod tests;

pub use anthropic::AnthropicClient;
pub use client::{CompletionRequest, DeltaStream, LlmClient};
pub use fallback::{DEFAULT_CANNED_REPLY, FallbackChain};
pub use mock::{MockLlmClient, MockStep, MockStepKind};
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

use reqwest::Client;

const DISABLE_SYSTEM_PROXY_ENV: &str = "BRIGHTSPHERE_DISABLE_SYSTEM_PROXY";

/// Shared HTTP client for providers, opting out of system proxies in tests
/// or when the override env var is set.
pub(crate) fn build_http_client() -> Client {
    let disable = std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some() || cfg!(test);
    if disable {
        Client::builder()
            .no_proxy()
            .build()
            .expect("Failed to build reqwest client")
    } else {
        Client::new()
    }
}
