//! OpenAI-compatible chat completions client.

use super::{build_messages, ChatMessage, CompletionClient};
use crate::domain::{Config, GenerationRequest, GenerationResponse};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Longest slice of an unparseable error body quoted back to the user.
const ERROR_BODY_PREVIEW: usize = 200;

/// API credential. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the credential from [`API_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_value(std::env::var(API_KEY_ENV).ok())
    }

    pub fn from_value(value: Option<String>) -> Result<Self> {
        match value {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(Error::Config(format!("{API_KEY_ENV} environment variable is not set"))),
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Blocking client for `POST {base}/chat/completions`.
#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: ApiKey,
    temperature: Option<f32>,
}

impl OpenAiClient {
    pub fn new(
        api_base_url: &str,
        api_key: ApiKey,
        timeout: Duration,
        temperature: Option<f32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Api(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", api_base_url.trim_end_matches('/')),
            api_key,
            temperature,
        })
    }

    pub fn from_config(config: &Config, api_key: ApiKey) -> Result<Self> {
        Self::new(
            &config.api_base_url,
            api_key,
            Duration::from_secs(config.api_timeout_secs.max(1)),
            config.temperature,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let body = ChatRequest {
            model: &request.model,
            messages: build_messages(request),
            temperature: self.temperature,
        };
        debug!(
            endpoint = %self.endpoint,
            request = %serde_json::to_string_pretty(&body).unwrap_or_default(),
            "API request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Api("request timed out".to_string())
                } else {
                    Error::Api(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text =
            response.text().map_err(|e| Error::Api(format!("failed to read response: {e}")))?;
        debug!(%status, response = %text, "API response");

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        Ok(GenerationResponse {
            raw: parse_envelope(&text)?,
            requested: request.count,
            model: request.model.clone(),
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().chars().take(ERROR_BODY_PREVIEW).collect());
    let summary = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication failed",
        StatusCode::TOO_MANY_REQUESTS => "rate limit or quota exceeded",
        _ => "request rejected",
    };
    if detail.is_empty() {
        Error::Api(format!("{summary} (HTTP {status})"))
    } else {
        Error::Api(format!("{summary} (HTTP {status}): {detail}"))
    }
}

fn parse_envelope(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Api(format!("malformed response envelope: {e}")))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::Api("malformed response envelope: no message content".to_string()))
}
