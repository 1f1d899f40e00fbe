//! Anthropic Messages API provider.
//!
//! Sends the recommendation prompt as a single user turn and concatenates the
//! text blocks of the reply. Remembers `retry-after` from a throttled reply
//! and refuses to call again until it has passed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use vigil_types::errors::VigilError;
use vigil_types::traits::LlmProvider;
use vigil_types::{ChatMessage, ChatRole, CompletionRequest, CompletionResponse, TokenUsage};

/// Default Anthropic API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

/// Anthropic LLM provider using the Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    /// Base URL for the API (overridable for testing).
    api_base: String,
    /// Earliest instant another request may be sent after a 429.
    blocked_until: Mutex<Option<Instant>>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: ApiUsage,
}

/// Response content block. Only text is requested; anything else is skipped.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE.to_string())
    }

    /// Create a provider with a custom base URL (for testing).
    pub fn with_base_url(api_key: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base,
            blocked_until: Mutex::new(None),
        }
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect()
    }

    fn build_request(request: CompletionRequest) -> MessagesRequest {
        MessagesRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            system: (!request.system.is_empty()).then_some(request.system),
            messages: Self::convert_messages(&request.messages),
            temperature: request.temperature,
        }
    }

    fn parse_response(resp: MessagesResponse) -> CompletionResponse {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            content,
            model: resp.model,
            usage: TokenUsage {
                input_tokens: resp.usage.input_tokens,
                output_tokens: resp.usage.output_tokens,
            },
        }
    }

    async fn check_rate_limit(&self) -> Result<(), VigilError> {
        let blocked_until = self.blocked_until.lock().await;
        if let Some(until) = *blocked_until {
            let now = Instant::now();
            if now < until {
                return Err(VigilError::RateLimitExceeded(format!(
                    "Anthropic rate limit reached, retry after {}s",
                    until.duration_since(now).as_secs()
                )));
            }
        }
        Ok(())
    }

    async fn send_request(&self, request: MessagesRequest) -> Result<CompletionResponse, VigilError> {
        self.check_rate_limit().await?;

        let url = format!("{}/v1/messages", self.api_base);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| VigilError::LlmProvider(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            if let Some(secs) = retry_after {
                *self.blocked_until.lock().await = Some(Instant::now() + Duration::from_secs(secs));
            }
            return Err(VigilError::RateLimitExceeded(
                "Anthropic API rate limit exceeded (429)".to_string(),
            ));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VigilError::LlmProvider(
                "Anthropic API authentication failed: invalid API key".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(VigilError::LlmProvider(format!(
                    "Anthropic API error ({}): {}",
                    err_resp.error.error_type, err_resp.error.message
                )));
            }
            return Err(VigilError::LlmProvider(format!(
                "Anthropic API error (HTTP {status}): {body}"
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VigilError::LlmProvider(format!("Failed to parse response: {e}")))?;

        Ok(Self::parse_response(body))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VigilError> {
        self.send_request(Self::build_request(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a clinical decision support assistant.".to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "Recommend treatments for patient P12345.".to_string(),
            }],
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 1024,
            temperature: Some(0.0),
        }
    }

    #[test]
    fn test_empty_system_prompt_omitted() {
        let mut request = sample_request();
        request.system = String::new();
        request.temperature = None;

        let json = serde_json::to_value(AnthropicProvider::build_request(request)).unwrap();
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_response_joins_text_and_skips_other_blocks() {
        let resp: MessagesResponse = serde_json::from_value(serde_json::json!({
            "content": [
                {"type": "text", "text": "[{\"name\": "},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "\"Metformin\"}]"}
            ],
            "model": "claude-haiku-4-5",
            "usage": {"input_tokens": 10, "output_tokens": 8}
        }))
        .unwrap();

        let result = AnthropicProvider::parse_response(resp);
        assert_eq!(result.content, "[{\"name\": \"Metformin\"}]");
        assert_eq!(result.usage.output_tokens, 8);
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-haiku-4-5",
                "system": "You are a clinical decision support assistant."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "message",
                "content": [{"type": "text", "text": "[]"}],
                "model": "claude-haiku-4-5",
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("test-key".to_string(), server.uri());
        let result = provider.complete(sample_request()).await.unwrap();

        assert_eq!(result.content, "[]");
        assert_eq!(result.model, "claude-haiku-4-5");
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_next_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "60")
                    .set_body_json(serde_json::json!({
                        "type": "error",
                        "error": {"type": "rate_limit_error", "message": "Rate limit exceeded"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("test-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        assert!(matches!(err, VigilError::RateLimitExceeded(_)));

        // Refused locally without reaching the server.
        let err = provider.complete(sample_request()).await.unwrap_err();
        match err {
            VigilError::RateLimitExceeded(msg) => assert!(msg.contains("retry after")),
            other => panic!("Expected RateLimitExceeded, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("bad-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();

        match err {
            VigilError::LlmProvider(msg) => {
                assert!(msg.contains("authentication"), "unexpected message: {msg}");
            }
            other => panic!("Expected LlmProvider error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_body_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
            })))
            .mount(&server)
            .await;

        let provider = AnthropicProvider::with_base_url("test-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"));
    }
}
