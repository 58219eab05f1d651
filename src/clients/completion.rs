//! Chat-completion client for OpenRouter and other OpenAI-compatible routers.
//!
//! The analyzers only see the [`CompletionGateway`] trait, so tests drive
//! them with a scripted gateway and production wires in [`OpenRouterClient`].
//!
//! # API Reference
//!
//! See: <https://openrouter.ai/docs/api-reference/chat-completion>

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::ChatMessage;

/// Base URL for the OpenRouter API.
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Free model used unless configured otherwise.
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-nano-9b-v2:free";

/// Value shipped in the sample environment file. Treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your_openrouter_api_key_here";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_TEMPERATURE: f32 = 0.1;
const APP_TITLE: &str = "Arogya Health System";

/// Why a completion could not be obtained.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("completion request timed out")]
    Timeout,

    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion API returned status {0}")]
    Status(u16),

    #[error("malformed completion response: {0}")]
    Malformed(String),

    #[error("completion response contained no content")]
    EmptyResponse,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Malformed(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

/// Something that turns a conversation into the assistant's next message.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Send `messages` and return the text of the first choice.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, GatewayError>;

    /// Single-turn helper: optional system instruction plus one user prompt.
    async fn ask(&self, system: &str, prompt: &str) -> Result<String, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if !system.trim().is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.complete(messages).await
    }
}

/// Returns the key if it is usable, treating blanks and the sample
/// placeholder as absent.
pub fn usable_api_key(key: Option<&str>) -> Option<String> {
    let key = key?.trim();
    if key.is_empty() || key == PLACEHOLDER_API_KEY {
        None
    } else {
        Some(key.to_string())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    referer: Option<String>,
}

impl OpenRouterClient {
    /// Create a client against the public OpenRouter API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(OPENROUTER_API_BASE, api_key)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            temperature: Some(DEFAULT_TEMPERATURE),
            referer: None,
        }
    }

    /// Build a client only when `api_key` is usable.
    pub fn from_key(base_url: &str, api_key: Option<&str>) -> Option<Self> {
        usable_api_key(api_key).map(|key| Self::with_base_url(base_url, key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Origin sent as `HTTP-Referer` for OpenRouter's app attribution.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", APP_TITLE);
        match &self.referer {
            Some(referer) => req.header("HTTP-Referer", referer),
            None => req,
        }
    }
}

#[async_trait]
impl CompletionGateway for OpenRouterClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, messages = messages.len(), "Requesting completion");

        let response = self.build_request(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let data = response.json::<CompletionResponse>().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        json!({
            "id": "gen-1",
            "model": DEFAULT_MODEL,
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn test_usable_api_key() {
        assert_eq!(usable_api_key(None), None);
        assert_eq!(usable_api_key(Some("")), None);
        assert_eq!(usable_api_key(Some("   ")), None);
        assert_eq!(usable_api_key(Some(PLACEHOLDER_API_KEY)), None);
        assert_eq!(usable_api_key(Some(" sk-or-1 ")), Some("sk-or-1".to_string()));
        assert!(OpenRouterClient::from_key(OPENROUTER_API_BASE, Some(PLACEHOLDER_API_KEY)).is_none());
    }

    #[tokio::test]
    async fn test_complete_sends_expected_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("x-title", APP_TITLE))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "max_tokens": 2000,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Hi there")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key");
        let reply = client.ask("Be brief.", "Hello").await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_blank_system_prompt_is_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "Hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key");
        assert_eq!(client.ask("", "Hello").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key");
        let err = client.ask("", "Hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Status(429)));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key");
        let err = client.ask("", "Hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key");
        let err = client.ask("", "Hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = OpenRouterClient::with_base_url(&server.uri(), "test-key")
            .with_timeout(Duration::from_millis(50));
        let err = client.ask("", "Hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout));
    }
}
