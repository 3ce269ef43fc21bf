//! Support chat: message persistence and live fan-out.
//!
//! Every stored message is published to the chat's room on [`ChatHub`].
//! WebSocket connections subscribe to the room and render each message for
//! their own viewer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use shoppingify_core::validation::REQUIRED;
use shoppingify_core::{ChatId, MessageAuthor, Owner, UserId, ValidationErrors};

use crate::db::chat::{self, ChatRepository};
use crate::db::RepositoryError;
use crate::models::chat::{Chat, ChatMessage, ChatSummary};

/// Messages buffered per room before slow subscribers start lagging.
const ROOM_CAPACITY: usize = 64;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Errors from chat operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("chat not found")]
    ChatNotFound,
}

/// In-process rooms, one broadcast channel per chat.
#[derive(Clone, Default)]
pub struct ChatHub {
    rooms: Arc<Mutex<HashMap<ChatId, broadcast::Sender<ChatMessage>>>>,
}

impl ChatHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a chat's room.
    #[must_use]
    pub fn subscribe(&self, chat_id: ChatId) -> broadcast::Receiver<ChatMessage> {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms
            .entry(chat_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Send a message to everyone in its room. Returns the number of
    /// subscribers reached. Empty rooms are dropped.
    pub fn publish(&self, message: &ChatMessage) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = rooms.get(&message.chat_id) else {
            return 0;
        };

        if let Ok(reached) = sender.send(message.clone()) {
            reached
        } else {
            rooms.remove(&message.chat_id);
            0
        }
    }

    /// Drop a chat's room once its last subscriber is gone.
    ///
    /// Call after the socket's receiver has been dropped.
    pub fn leave(&self, chat_id: ChatId) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if rooms
            .get(&chat_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            rooms.remove(&chat_id);
        }
    }

    /// Number of rooms with a live channel.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Trim and check a message body.
///
/// # Errors
///
/// Returns a `content` field error when the body is blank or too long.
pub fn validate_content(content: &str) -> Result<&str, ValidationErrors> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationErrors::field("content", REQUIRED));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationErrors::field(
            "content",
            format!("Ensure this field has no more than {MAX_MESSAGE_LENGTH} characters."),
        ));
    }
    Ok(content)
}

/// Chat service.
pub struct ChatService<'a> {
    pool: &'a PgPool,
    hub: &'a ChatHub,
}

impl<'a> ChatService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, hub: &'a ChatHub) -> Self {
        Self { pool, hub }
    }

    /// The requester's chat, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Repository` if a query fails.
    pub async fn chat_for(&self, owner: Owner) -> Result<Chat, ChatError> {
        if let Some(chat) = ChatRepository::new(self.pool).find_by_owner(owner).await? {
            return Ok(chat);
        }
        let mut conn = self.pool.acquire().await?;
        Ok(chat::get_or_create(&mut conn, owner).await?)
    }

    /// Messages of the requester's chat, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Repository` if a query fails.
    pub async fn messages(&self, owner: Owner) -> Result<Vec<ChatMessage>, ChatError> {
        let chat = self.chat_for(owner).await?;
        Ok(ChatRepository::new(self.pool).list_messages(chat.id).await?)
    }

    /// Store a message from the chat's owner and publish it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Invalid` for a blank or oversized body.
    #[instrument(skip(self, content), fields(owner = %owner))]
    pub async fn post_as_owner(&self, owner: Owner, content: &str) -> Result<ChatMessage, ChatError> {
        let content = validate_content(content)?;
        let author = if owner.is_guest() {
            MessageAuthor::Guest
        } else {
            MessageAuthor::User
        };

        let mut tx = self.pool.begin().await?;
        let chat = chat::get_or_create(&mut tx, owner).await?;
        let message = chat::insert_message(&mut tx, chat.id, author, Some(owner), content).await?;
        tx.commit().await?;

        self.broadcast(&message);
        Ok(message)
    }

    /// Store a staff reply in any chat and publish it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ChatNotFound` for an unknown chat.
    #[instrument(skip(self, content), fields(chat_id = %chat_id, staff = %staff))]
    pub async fn post_as_staff(
        &self,
        chat_id: ChatId,
        staff: UserId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let content = validate_content(content)?;
        self.insert(chat_id, MessageAuthor::User, Some(Owner::User(staff)), content)
            .await
    }

    /// Store an assistant reply and publish it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ChatNotFound` for an unknown chat.
    #[instrument(skip(self, content), fields(chat_id = %chat_id))]
    pub async fn post_as_assistant(
        &self,
        chat_id: ChatId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        self.insert(chat_id, MessageAuthor::Assistant, None, content)
            .await
    }

    async fn insert(
        &self,
        chat_id: ChatId,
        author: MessageAuthor,
        sender: Option<Owner>,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let mut tx = self.pool.begin().await?;
        let message = chat::insert_message(&mut tx, chat_id, author, sender, content)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => ChatError::ChatNotFound,
                other => other.into(),
            })?;
        tx.commit().await?;

        self.broadcast(&message);
        Ok(message)
    }

    fn broadcast(&self, message: &ChatMessage) {
        let reached = self.hub.publish(message);
        debug!(message_id = %message.id, chat_id = %message.chat_id, reached, "Message published");
    }

    /// All chats for the admin dashboard, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Repository` if a query fails.
    pub async fn summaries(&self) -> Result<Vec<ChatSummary>, ChatError> {
        Ok(ChatRepository::new(self.pool).list_summaries().await?)
    }

    /// One chat with its messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ChatNotFound` for an unknown chat.
    pub async fn detail(&self, chat_id: ChatId) -> Result<(ChatSummary, Vec<ChatMessage>), ChatError> {
        let repo = ChatRepository::new(self.pool);
        let summary = repo
            .get_summary(chat_id)
            .await?
            .ok_or(ChatError::ChatNotFound)?;
        let messages = repo.list_messages(chat_id).await?;
        Ok((summary, messages))
    }
}
