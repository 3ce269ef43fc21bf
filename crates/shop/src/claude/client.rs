//! Claude API client.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};

use crate::config::ClaudeConfig;

use super::error::{ApiErrorResponse, ClaudeError};
use super::types::{ChatRequest, ChatResponse, Message};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Claude API client.
#[derive(Clone)]
pub struct ClaudeClient {
    inner: Arc<ClaudeClientInner>,
}

struct ClaudeClientInner {
    client: reqwest::Client,
    model: String,
}

impl ClaudeClient {
    /// Create a new Claude client.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::Config` if the API key is not a valid header
    /// value or the HTTP client cannot be built.
    pub fn new(config: &ClaudeConfig) -> Result<Self, ClaudeError> {
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| ClaudeError::Config("invalid Anthropic API key".to_owned()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ClaudeError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ClaudeClientInner {
                client,
                model: config.model.clone(),
            }),
        })
    }

    /// Model requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// Send a conversation and return the complete response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with an
    /// error status.
    #[instrument(skip(self, messages, system), fields(model = %self.inner.model))]
    pub async fn chat(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
    ) -> Result<ChatResponse, ClaudeError> {
        let request = ChatRequest {
            model: self.inner.model.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages,
            system,
            temperature: Some(DEFAULT_TEMPERATURE),
        };

        let response = self
            .inner
            .client
            .post(ANTHROPIC_API_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ClaudeError::Parse(format!("Failed to parse response: {e}")))?;

        debug!(
            id = %parsed.id,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "Claude response received"
        );
        Ok(parsed)
    }

    /// Ask a single question under `system` and return the text answer.
    ///
    /// # Errors
    ///
    /// Returns `ClaudeError::EmptyResponse` when the answer has no text.
    pub async fn complete(&self, system: String, prompt: String) -> Result<String, ClaudeError> {
        let response = self.chat(vec![Message::user(prompt)], Some(system)).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(ClaudeError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Map an error status code onto a `ClaudeError`.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> ClaudeError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return ClaudeError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return ClaudeError::Unauthorized("Invalid API key".to_string());
    }

    match response.text().await {
        Ok(body) => parse_error_body(body),
        Err(e) => ClaudeError::Http(e),
    }
}

fn parse_error_body(body: String) -> ClaudeError {
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_error) => ClaudeError::Api {
            error_type: api_error.error.error_type,
            message: api_error.error.message,
        },
        Err(_) => ClaudeError::Api {
            error_type: "unknown".to_string(),
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_parse_error_body() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert!(matches!(
            parse_error_body(body.to_owned()),
            ClaudeError::Api { error_type, .. } if error_type == "overloaded_error"
        ));

        assert!(matches!(
            parse_error_body("upstream timeout".to_owned()),
            ClaudeError::Api { error_type, message } if error_type == "unknown" && message == "upstream timeout"
        ));
    }

    #[test]
    fn test_invalid_api_key_is_config_error() {
        let config = ClaudeConfig {
            api_key: SecretString::from("bad\nkey"),
            model: "claude-sonnet-4-20250514".to_owned(),
        };
        assert!(matches!(
            ClaudeClient::new(&config),
            Err(ClaudeError::Config(_))
        ));
    }

    #[test]
    fn test_claude_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<ClaudeClient>();
    }
}
