//! Admin chat inbox.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use shoppingify_core::{ChatId, Owner};

use crate::error::Result;
use crate::middleware::{ApiJson, RequireStaff};
use crate::routes::chat::NewMessage;
use crate::routes::payloads::{ChatDetailView, ChatListEntry, MessageView};
use crate::services::chat::ChatService;
use crate::state::AppState;

/// All chats, most recently active first.
///
/// GET /api/admin/chats
pub async fn list(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<Json<Vec<ChatListEntry>>> {
    let viewer = Some(Owner::User(staff.id));
    let summaries = ChatService::new(state.pool(), state.chat_hub())
        .summaries()
        .await?;

    Ok(Json(
        summaries
            .iter()
            .map(|s| ChatListEntry::new(s, viewer))
            .collect(),
    ))
}

/// One chat with its messages.
///
/// GET /api/admin/chats/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(chat_id): Path<ChatId>,
) -> Result<Json<ChatDetailView>> {
    let viewer = Some(Owner::User(staff.id));
    let (summary, messages) = ChatService::new(state.pool(), state.chat_hub())
        .detail(chat_id)
        .await?;

    Ok(Json(ChatDetailView {
        chat: ChatListEntry::new(&summary, viewer),
        messages: messages
            .iter()
            .map(|m| MessageView::new(m, viewer))
            .collect(),
    }))
}

/// Reply in a chat as staff.
///
/// POST /api/admin/chats/{id}/messages
pub async fn reply(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(chat_id): Path<ChatId>,
    ApiJson(body): ApiJson<NewMessage>,
) -> Result<(StatusCode, Json<MessageView>)> {
    let message = ChatService::new(state.pool(), state.chat_hub())
        .post_as_staff(chat_id, staff.id, &body.content)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageView::new(&message, Some(Owner::User(staff.id)))),
    ))
}
