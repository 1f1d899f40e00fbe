//! OpenAI chat completions provider.
//!
//! The system prompt travels as the first `system` message. Only the first
//! choice of the reply is used.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use vigil_types::errors::VigilError;
use vigil_types::traits::LlmProvider;
use vigil_types::{ChatRole, CompletionRequest, CompletionResponse, TokenUsage};

/// Default OpenAI API base URL.
const DEFAULT_API_BASE: &str = "https://api.openai.com";

/// OpenAI LLM provider using `/v1/chat/completions`.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    /// Base URL for the API (overridable for testing).
    api_base: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE.to_string())
    }

    /// Create a provider with a custom base URL (for testing).
    pub fn with_base_url(api_key: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn build_request(request: CompletionRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(ApiMessage {
                role: "system",
                content: request.system,
            });
        }
        messages.extend(request.messages.into_iter().map(|m| ApiMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: m.content,
        }));

        ChatCompletionRequest {
            model: request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn parse_response(resp: ChatCompletionResponse) -> Result<CompletionResponse, VigilError> {
        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                VigilError::LlmProvider("OpenAI response contained no message content".to_string())
            })?;

        let usage = resp
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            model: resp.model,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, VigilError> {
        let url = format!("{}/v1/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| VigilError::LlmProvider(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(VigilError::RateLimitExceeded(
                "OpenAI API rate limit exceeded (429)".to_string(),
            ));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(VigilError::LlmProvider(
                "OpenAI API authentication failed: invalid API key".to_string(),
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(VigilError::LlmProvider(format!(
                    "OpenAI API error ({}): {}",
                    err_resp.error.error_type.as_deref().unwrap_or("unknown"),
                    err_resp.error.message
                )));
            }
            return Err(VigilError::LlmProvider(format!(
                "OpenAI API error (HTTP {status}): {body}"
            )));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| VigilError::LlmProvider(format!("Failed to parse response: {e}")))?;

        Self::parse_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a clinical decision support assistant.".to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "Recommend treatments.".to_string(),
            }],
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: Some(0.0),
        }
    }

    #[test]
    fn test_system_prompt_becomes_first_message() {
        let json = serde_json::to_value(OpenAiProvider::build_request(sample_request())).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_empty_system_prompt_omitted() {
        let mut request = sample_request();
        request.system = String::new();
        let json = serde_json::to_value(OpenAiProvider::build_request(request)).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "[]"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key".to_string(), server.uri());
        let result = provider.complete(sample_request()).await.unwrap();

        assert_eq!(result.content, "[]");
        assert_eq!(result.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(result.usage.input_tokens, 12);
        assert_eq!(result.usage.output_tokens, 2);
    }

    #[tokio::test]
    async fn test_empty_choices_is_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "choices": []
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        assert!(matches!(err, VigilError::LlmProvider(msg) if msg.contains("no message content")));
    }

    #[tokio::test]
    async fn test_rate_limit_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        assert!(matches!(err, VigilError::RateLimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("bad-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        match err {
            VigilError::LlmProvider(msg) => assert!(msg.contains("authentication")),
            other => panic!("Expected LlmProvider error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_api_error_body_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {
                    "message": "The model `gpt-9` does not exist",
                    "type": "invalid_request_error"
                }
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url("test-key".to_string(), server.uri());
        let err = provider.complete(sample_request()).await.unwrap_err();
        assert!(err.to_string().contains("gpt-9"));
    }
}
