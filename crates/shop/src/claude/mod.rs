//! Anthropic Messages API client used by the shopping assistant.
//!
//! Only plain text conversations are needed: one system prompt and one user
//! turn per question. Tool use and streaming are not used.

mod client;
mod error;
mod types;

pub use client::ClaudeClient;
pub use error::{ApiError, ApiErrorResponse, ClaudeError};
pub use types::{ChatRequest, ChatResponse, ContentBlock, Message, StopReason, Usage};
