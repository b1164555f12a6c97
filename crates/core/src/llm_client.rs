use anyhow::Result;
use async_openai::{
    config::{Config, OpenAIConfig},
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Why a completion request produced no usable text.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The service answered with a structured error payload.
    #[error("completion service returned an error: {0}")]
    Upstream(String),
    /// The request never got a response (connection, TLS, timeout).
    #[error("completion request failed: {0}")]
    Transport(String),
    /// A response arrived but could not be turned into assistant text.
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl From<OpenAIError> for CompletionError {
    fn from(err: OpenAIError) -> Self {
        match err {
            OpenAIError::ApiError(api_error) => Self::Upstream(api_error.message),
            OpenAIError::Reqwest(e) => Self::Transport(e.to_string()),
            other => Self::Malformed(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            max_tokens: 150,
            temperature: 0.8,
        }
    }
}

/// A single-shot text completion backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one system instruction and one user message, returning the raw
    /// content of the first choice.
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CompletionError>;
}

/// An implementation of `CompletionClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    http: reqwest::Client,
    config: OpenAIConfig,
    settings: CompletionSettings,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `settings` - Model and sampling parameters for every request.
    /// * `timeout` - Optional whole-request timeout. `None` keeps the HTTP
    ///   client's default behavior.
    ///
    /// Each call is a single HTTP request; nothing is retried.
    pub fn new(
        config: OpenAIConfig,
        settings: CompletionSettings,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut http = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            http = http.timeout(timeout);
        }

        Ok(Self {
            http: http.build()?,
            config,
            settings,
        })
    }

    #[allow(deprecated)]
    fn build_request(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<CreateChatCompletionRequest, OpenAIError> {
        // Older OpenAI-compatible backends only understand `max_tokens`.
        CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()?
                    .into(),
            ])
            .max_tokens(self.settings.max_tokens)
            .temperature(self.settings.temperature)
            .build()
    }
}

/// Extracts the message of an `error` field, whatever the HTTP status.
///
/// Accepts both the OpenAI shape (`{"error": {"message": ...}}`) and the bare
/// string some proxies send (`{"error": "..."}`).
fn upstream_error(body: &Value) -> Option<String> {
    let error = body.get("error").filter(|e| !e.is_null())?;
    let message = match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    };
    Some(message)
}

/// Turns a decoded response body into the first choice's text.
fn first_choice_text(body: Value) -> Result<String, CompletionError> {
    let response: CreateChatCompletionResponse = serde_json::from_value(body)
        .map_err(|e| CompletionError::Malformed(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::Malformed("response contained no choices".into()))?
        .message
        .content
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| CompletionError::Malformed("first choice had no content".into()))
}

#[async_trait]
impl CompletionClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<String, CompletionError> {
        let request = self.build_request(system_prompt, user_message)?;

        let response = self
            .http
            .post(self.config.url("/chat/completions"))
            .headers(self.config.headers())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(%status, len = bytes.len(), "Completion response received");

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            CompletionError::Malformed(format!("HTTP {}: body is not JSON: {}", status, e))
        })?;

        if let Some(message) = upstream_error(&body) {
            return Err(CompletionError::Upstream(message));
        }
        if !status.is_success() {
            return Err(CompletionError::Malformed(format!(
                "HTTP {} without an error payload",
                status
            )));
        }

        first_choice_text(body)
    }
}
