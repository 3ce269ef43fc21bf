//! Live chat over WebSocket.
//!
//! Each socket subscribes to its chat's room on the [`ChatHub`] and renders
//! every broadcast message for its own viewer, so `is_mine` is correct on
//! both ends of a conversation. Errors only go to the socket that caused
//! them.
//!
//! [`ChatHub`]: crate::services::chat::ChatHub

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use shoppingify_core::{ChatId, Owner, UserId};

use crate::error::{AppError, Result};
use crate::middleware::{RequireStaff, Requester};
use crate::routes::payloads::{ErrorFrame, MessageFrame, MessageView};
use crate::services::assistant::Assistant;
use crate::services::chat::{ChatError, ChatService};
use crate::state::AppState;

const CONTENT_REQUIRED: &str = "Message content is required";
const INVALID_JSON: &str = "Invalid JSON format";
const GENERIC_ERROR: &str = "An error occurred";

/// Who is typing into a socket.
#[derive(Debug, Clone, Copy)]
enum Speaker {
    /// The chat's owner; replies come from the assistant.
    Owner(Owner),
    /// A staff member answering someone else's chat.
    Staff(UserId),
}

impl Speaker {
    const fn viewer(self) -> Owner {
        match self {
            Self::Owner(owner) => owner,
            Self::Staff(user) => Owner::User(user),
        }
    }
}

/// Shopper socket.
///
/// GET /ws/chat
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Requester(owner): Requester,
) -> Result<Response> {
    let chat = ChatService::new(state.pool(), state.chat_hub())
        .chat_for(owner)
        .await?;

    info!(chat_id = %chat.id, owner = %owner, "Chat socket opened");
    Ok(ws.on_upgrade(move |socket| run(socket, state, chat.id, Speaker::Owner(owner))))
}

/// Staff socket on any chat.
///
/// GET /ws/admin/chats/{id}
///
/// Non-staff requests and unknown chats are refused before the upgrade.
pub async fn admin_chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(chat_id): Path<ChatId>,
) -> Result<Response> {
    let known = crate::db::ChatRepository::new(state.pool())
        .get_summary(chat_id)
        .await?
        .is_some();
    if !known {
        return Err(AppError::NotFound(format!("chat {chat_id}")));
    }

    info!(%chat_id, staff = %staff.id, "Admin chat socket opened");
    Ok(ws.on_upgrade(move |socket| run(socket, state, chat_id, Speaker::Staff(staff.id))))
}

fn encode<T: Serialize>(frame: &T) -> Option<Message> {
    serde_json::to_string(frame)
        .ok()
        .map(|text| Message::Text(text.into()))
}

fn error_frame(error: impl Into<String>) -> Option<Message> {
    encode(&ErrorFrame {
        error: error.into(),
    })
}

async fn run(socket: WebSocket, state: AppState, chat_id: ChatId, speaker: Speaker) {
    let (mut sink, mut stream) = socket.split();
    let hub = state.chat_hub().clone();
    let mut room = hub.subscribe(chat_id);
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<Message>();
    let viewer = speaker.viewer();

    let mut writer = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(frame) => Some(frame),
                    None => break,
                },
                broadcast = room.recv() => match broadcast {
                    Ok(message) => encode(&MessageFrame {
                        data: MessageView::new(&message, Some(viewer)),
                    }),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%chat_id, skipped, "Chat socket lagging");
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if let Some(frame) = outgoing {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut reader = tokio::spawn(async move {
        while let Some(Ok(incoming)) = stream.next().await {
            match incoming {
                Message::Text(text) => {
                    handle_text(&state, chat_id, speaker, text.as_str(), &direct_tx).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Await the aborted half so its room receiver is dropped before leaving.
    tokio::select! {
        _ = &mut writer => {
            reader.abort();
            let _ = reader.await;
        }
        _ = &mut reader => {
            writer.abort();
            let _ = writer.await;
        }
    }
    hub.leave(chat_id);
    debug!(%chat_id, "Chat socket closed");
}

/// Content of an incoming frame, or the error to answer with.
fn parse_frame(text: &str) -> std::result::Result<String, &'static str> {
    let value: Value = serde_json::from_str(text).map_err(|_| INVALID_JSON)?;
    value
        .get("content")
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
        .map(str::to_owned)
        .ok_or(CONTENT_REQUIRED)
}

async fn handle_text(
    state: &AppState,
    chat_id: ChatId,
    speaker: Speaker,
    text: &str,
    direct: &mpsc::UnboundedSender<Message>,
) {
    let content = match parse_frame(text) {
        Ok(content) => content,
        Err(error) => {
            if let Some(frame) = error_frame(error) {
                let _ = direct.send(frame);
            }
            return;
        }
    };

    let chat = ChatService::new(state.pool(), state.chat_hub());
    let posted = match speaker {
        Speaker::Owner(owner) => chat.post_as_owner(owner, &content).await,
        Speaker::Staff(staff) => chat.post_as_staff(chat_id, staff, &content).await,
    };

    if let Err(e) = posted {
        let message = match &e {
            ChatError::Invalid(errors) => errors
                .get("content")
                .and_then(<[String]>::first)
                .map_or_else(|| CONTENT_REQUIRED.to_owned(), Clone::clone),
            _ => {
                warn!(error = %e, %chat_id, "Failed to store chat message");
                GENERIC_ERROR.to_owned()
            }
        };
        if let Some(frame) = error_frame(message) {
            let _ = direct.send(frame);
        }
        return;
    }

    if matches!(speaker, Speaker::Owner(_)) {
        let state = state.clone();
        let direct = direct.clone();
        tokio::spawn(async move { reply_with_assistant(state, chat_id, content, direct).await });
    }
}

async fn reply_with_assistant(
    state: AppState,
    chat_id: ChatId,
    question: String,
    direct: mpsc::UnboundedSender<Message>,
) {
    let answer = Assistant::new(state.pool(), state.search(), state.claude())
        .answer(&question)
        .await;

    let result = match answer {
        Ok(answer) => ChatService::new(state.pool(), state.chat_hub())
            .post_as_assistant(chat_id, &answer)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    if let Err(e) = result {
        warn!(error = %e, %chat_id, "Assistant reply failed");
        if let Some(frame) = error_frame(format!("AI response error: {e}")) {
            let _ = direct.send(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame() {
        assert_eq!(parse_frame(r#"{"content": "hello"}"#), Ok("hello".to_owned()));
        assert_eq!(parse_frame(r#"{"content": ""}"#), Err(CONTENT_REQUIRED));
        assert_eq!(parse_frame(r#"{"text": "hello"}"#), Err(CONTENT_REQUIRED));
        assert_eq!(parse_frame(r#"{"content": 5}"#), Err(CONTENT_REQUIRED));
        assert_eq!(parse_frame("not json"), Err(INVALID_JSON));
    }

    #[test]
    fn test_staff_views_as_user() {
        let staff = UserId::new(3);
        assert_eq!(Speaker::Staff(staff).viewer(), Owner::User(staff));
    }
}
