//! HTTP-level provider tests against a local mock server.

use std::sync::Arc;

use futures::TryStreamExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::conversation::Message;
use crate::error::AiError;
use crate::llm::{
    AnthropicClient, CompletionRequest, FallbackChain, LlmClient, MockLlmClient, MockStep,
    OpenAiClient, RetryPolicy,
};

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![Message::user("explain photosynthesis")])
}

fn sse_body(frames: &[&str]) -> String {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push('\n');
    }
    body
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(5),
        multiplier: 2.0,
    }
}

#[tokio::test]
async fn openai_stream_reassembles_the_reply() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"{"choices":[{"delta":{"content":"Photo"}}]}"#,
        r#"{"choices":[{"delta":{"content":"synthesis"}}]}"#,
        r#"{"choices":[{"delta":{}}]}"#,
        "[DONE]",
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new("test-key").with_base_url(server.uri());
    let deltas: Vec<String> = client
        .complete_stream(request())
        .try_collect()
        .await
        .unwrap();

    assert_eq!(deltas, vec!["Photo", "synthesis"]);
}

#[tokio::test]
async fn openai_complete_returns_the_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "Chlorophyll captures light."}}]
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new("test-key").with_base_url(server.uri());
    let reply = client.complete(request()).await.unwrap();
    assert_eq!(reply, "Chlorophyll captures light.");
}

#[tokio::test]
async fn openai_retries_rate_limits_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "recovered"}}]
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new("test-key")
        .with_base_url(server.uri())
        .with_retry_policy(fast_retries());
    assert_eq!(client.complete(request()).await.unwrap(), "recovered");
}

#[tokio::test]
async fn openai_auth_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new("wrong-key")
        .with_base_url(server.uri())
        .with_retry_policy(fast_retries());
    let err = client.complete(request()).await.unwrap_err();
    assert!(matches!(err, AiError::LlmHttp { status: 401, .. }));
}

#[tokio::test]
async fn anthropic_stream_extracts_text_deltas() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Light "}}"#,
        r#"{"type":"ping"}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"reactions"}}"#,
        r#"{"type":"message_stop"}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let client = AnthropicClient::new("test-key").with_base_url(server.uri());
    let deltas: Vec<String> = client
        .complete_stream(request())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(deltas.concat(), "Light reactions");
}

#[tokio::test]
async fn anthropic_complete_joins_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": [
                {"type": "text", "text": "Part one. "},
                {"type": "text", "text": "Part two."}
            ]
        })))
        .mount(&server)
        .await;

    let client = AnthropicClient::new("test-key").with_base_url(server.uri());
    assert_eq!(
        client.complete(request()).await.unwrap(),
        "Part one. Part two."
    );
}

#[tokio::test]
async fn chain_falls_back_when_the_primary_endpoint_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let primary = OpenAiClient::new("test-key")
        .with_base_url(server.uri())
        .with_retry_policy(RetryPolicy::none());
    let backup = MockLlmClient::from_steps("backup", vec![MockStep::deltas(vec!["sa", "ved"])]);
    let chain = FallbackChain::new(vec![Arc::new(primary), Arc::new(backup)]);

    let deltas: Vec<String> = chain.complete_stream(request()).try_collect().await.unwrap();
    assert_eq!(deltas.concat(), "saved");
}
