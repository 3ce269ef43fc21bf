//! Error types for the Claude API client.

use thiserror::Error;

/// Errors that can occur when interacting with the Claude API.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Claude API returned an error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The client could not be built from configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The response held no text block.
    #[error("empty response")]
    EmptyResponse,
}

/// API error response from Claude.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_error_display() {
        let err = ClaudeError::RateLimited(30);
        assert_eq!(err.to_string(), "rate limited, retry after 30 seconds");

        let err = ClaudeError::Api {
            error_type: "overloaded_error".to_string(),
            message: "Overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (overloaded_error): Overloaded");
    }

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "message": "model: field required"
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.error_type, "error");
        assert_eq!(response.error.error_type, "invalid_request_error");
        assert_eq!(response.error.message, "model: field required");
    }
}
