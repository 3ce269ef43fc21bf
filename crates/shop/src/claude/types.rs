//! Request and response types for the Anthropic Messages API.

use serde::{Deserialize, Serialize};

/// A message in a conversation with Claude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// A content block within a response.
///
/// Block types other than text are kept but ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Request body for the Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from the Messages API.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub stop_reason: Option<StopReason>,
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

impl ChatResponse {
    /// Concatenated text of every text block.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    #[serde(other)]
    Other,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let request = ChatRequest {
            model: "claude-sonnet-4-20250514".to_owned(),
            max_tokens: 1024,
            messages: vec![Message::user("Do you sell phones?")],
            system: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Do you sell phones?");
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let json = r#"{
            "id": "msg_01",
            "model": "claude-sonnet-4-20250514",
            "stop_reason": "end_turn",
            "content": [
                {"type": "text", "text": "We have "},
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "two phones."}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 5}
        }"#;
        let response: ChatResponse = serde_json::from_str(json).expect("deserialize");
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.text(), "We have two phones.");
    }
}
