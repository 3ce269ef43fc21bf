//! Shopper chat REST handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::{ApiJson, Requester};
use crate::routes::payloads::MessageView;
use crate::services::chat::ChatService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    #[serde(default)]
    pub content: String,
}

/// Messages of the requester's chat, newest first.
///
/// GET /api/chats/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Requester(owner): Requester,
) -> Result<Json<Vec<MessageView>>> {
    let messages = ChatService::new(state.pool(), state.chat_hub())
        .messages(owner)
        .await?;

    Ok(Json(
        messages
            .iter()
            .map(|m| MessageView::new(m, Some(owner)))
            .collect(),
    ))
}

/// Post a message to the requester's chat.
///
/// POST /api/chats/messages
///
/// Live sockets on the chat receive it too. The assistant only answers
/// messages sent over the socket.
pub async fn create_message(
    State(state): State<AppState>,
    Requester(owner): Requester,
    ApiJson(body): ApiJson<NewMessage>,
) -> Result<(StatusCode, Json<MessageView>)> {
    let message = ChatService::new(state.pool(), state.chat_hub())
        .post_as_owner(owner, &body.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageView::new(&message, Some(owner))),
    ))
}
