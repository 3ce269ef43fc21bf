//! Chat repository: conversations, messages and guest chat migration.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shoppingify_core::{ChatId, GuestId, MessageAuthor, MessageId, Owner, UserId};

use super::RepositoryError;
use crate::models::chat::{AuthorProfile, Chat, ChatMessage, ChatSummary};

const CHAT_SELECT: &str = r"
    SELECT c.id, c.user_id, c.guest_id, c.latest_message_id, c.created_at,
           u.first_name AS owner_first_name, u.last_name AS owner_last_name,
           u.email AS owner_email, u.profile_photo AS owner_profile_photo
    FROM chats c
    LEFT JOIN users u ON u.id = c.user_id
";

const MESSAGE_SELECT: &str = r"
    SELECT m.id, m.chat_id, m.content, m.author, m.user_id, m.guest_id, m.created_at,
           u.first_name, u.last_name, u.email, u.profile_photo
    FROM messages m
    LEFT JOIN users u ON u.id = m.user_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i32,
    user_id: Option<i32>,
    guest_id: Option<Uuid>,
    latest_message_id: Option<i32>,
    created_at: DateTime<Utc>,
    owner_first_name: Option<String>,
    owner_last_name: Option<String>,
    owner_email: Option<String>,
    owner_profile_photo: Option<String>,
}

impl ChatRow {
    fn into_parts(self) -> Result<(Chat, Option<AuthorProfile>), RepositoryError> {
        let owner = Owner::from_columns(
            self.user_id.map(UserId::new),
            self.guest_id.map(GuestId::from_uuid),
        )
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("chat {} has no single owner", self.id))
        })?;

        let profile = profile_from_columns(
            self.owner_first_name,
            self.owner_last_name,
            self.owner_email,
            self.owner_profile_photo,
        );

        let chat = Chat {
            id: ChatId::new(self.id),
            owner,
            latest_message_id: self.latest_message_id.map(MessageId::new),
            created_at: self.created_at,
        };
        Ok((chat, profile))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    chat_id: i32,
    content: String,
    author: MessageAuthor,
    user_id: Option<i32>,
    guest_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    profile_photo: Option<String>,
}

impl From<MessageRow> for ChatMessage {
    fn from(row: MessageRow) -> Self {
        let profile = match row.author {
            MessageAuthor::Assistant => Some(AuthorProfile::assistant()),
            MessageAuthor::User => {
                profile_from_columns(row.first_name, row.last_name, row.email, row.profile_photo)
            }
            MessageAuthor::Guest => None,
        };

        Self {
            id: MessageId::new(row.id),
            chat_id: ChatId::new(row.chat_id),
            content: row.content,
            author: row.author,
            user_id: row.user_id.map(UserId::new),
            guest_id: row.guest_id.map(GuestId::from_uuid),
            profile,
            created_at: row.created_at,
        }
    }
}

fn profile_from_columns(
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    profile_photo: Option<String>,
) -> Option<AuthorProfile> {
    Some(AuthorProfile {
        first_name: first_name?,
        last_name: last_name?,
        email: email?,
        profile_photo,
    })
}

// =============================================================================
// Repository (pool-level reads)
// =============================================================================

/// Repository for chat reads.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The chat owned by `owner`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_owner(&self, owner: Owner) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query_as::<_, ChatRow>(&format!(
            r"{CHAT_SELECT}
            WHERE c.user_id IS NOT DISTINCT FROM $1
              AND c.guest_id IS NOT DISTINCT FROM $2"
        ))
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_parts().map(|(chat, _)| chat)).transpose()
    }

    /// Messages of a chat, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{MESSAGE_SELECT} WHERE m.chat_id = $1 ORDER BY m.created_at DESC, m.id DESC"
        ))
        .bind(chat_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    /// A single chat with its owner profile and latest message.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_summary(&self, chat_id: ChatId) -> Result<Option<ChatSummary>, RepositoryError> {
        let row = sqlx::query_as::<_, ChatRow>(&format!("{CHAT_SELECT} WHERE c.id = $1"))
            .bind(chat_id)
            .fetch_optional(self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut summaries = self.attach_latest(vec![row.into_parts()?]).await?;
        Ok(summaries.pop())
    }

    /// Every chat for the staff dashboard, most recently active first.
    ///
    /// Chats without messages sort last.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_summaries(&self) -> Result<Vec<ChatSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatRow>(&format!(
            r"{CHAT_SELECT}
            LEFT JOIN messages lm ON lm.id = c.latest_message_id
            ORDER BY lm.created_at DESC NULLS LAST, c.id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        let chats = rows
            .into_iter()
            .map(ChatRow::into_parts)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_latest(chats).await
    }

    async fn attach_latest(
        &self,
        chats: Vec<(Chat, Option<AuthorProfile>)>,
    ) -> Result<Vec<ChatSummary>, RepositoryError> {
        let ids: Vec<i32> = chats
            .iter()
            .filter_map(|(chat, _)| chat.latest_message_id.map(|id| id.as_i32()))
            .collect();

        let mut latest: HashMap<MessageId, ChatMessage> = if ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id = ANY($1)"))
                .bind(&ids)
                .fetch_all(self.pool)
                .await?
                .into_iter()
                .map(|row| {
                    let message = ChatMessage::from(row);
                    (message.id, message)
                })
                .collect()
        };

        Ok(chats
            .into_iter()
            .map(|(chat, owner_profile)| {
                let latest_message = chat.latest_message_id.and_then(|id| latest.remove(&id));
                ChatSummary {
                    chat,
                    owner_profile,
                    latest_message,
                }
            })
            .collect())
    }
}

// =============================================================================
// Transactional writes
// =============================================================================

/// Return the owner's chat, creating it if absent.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_or_create(conn: &mut PgConnection, owner: Owner) -> Result<Chat, RepositoryError> {
    sqlx::query("INSERT INTO chats (user_id, guest_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, ChatRow>(&format!(
        r"{CHAT_SELECT}
        WHERE c.user_id IS NOT DISTINCT FROM $1
          AND c.guest_id IS NOT DISTINCT FROM $2"
    ))
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .fetch_one(conn)
    .await?;

    Ok(row.into_parts()?.0)
}

/// Insert a message and link it as the chat's latest.
///
/// The chat row is locked first so concurrent writers serialize on it.
/// `sender` is the identity recorded on the message; `None` for the assistant.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the chat does not exist.
pub async fn insert_message(
    conn: &mut PgConnection,
    chat_id: ChatId,
    author: MessageAuthor,
    sender: Option<Owner>,
    content: &str,
) -> Result<ChatMessage, RepositoryError> {
    let locked: Option<i32> = sqlx::query_scalar("SELECT id FROM chats WHERE id = $1 FOR UPDATE")
        .bind(chat_id)
        .fetch_optional(&mut *conn)
        .await?;
    if locked.is_none() {
        return Err(RepositoryError::NotFound);
    }

    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO messages (chat_id, content, author, user_id, guest_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(chat_id)
    .bind(content)
    .bind(author)
    .bind(sender.and_then(Owner::user_id))
    .bind(sender.and_then(Owner::guest_id))
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query("UPDATE chats SET latest_message_id = $2 WHERE id = $1")
        .bind(chat_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id = $1"))
        .bind(id)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}

/// Hand a guest's chat over to a user who just logged in.
///
/// Guest-authored messages become the user's. When the user already has a
/// chat the messages move into it and the guest chat is dropped; otherwise
/// the guest chat is re-owned.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn migrate_guest_chat(
    conn: &mut PgConnection,
    guest: GuestId,
    user: UserId,
) -> Result<(), RepositoryError> {
    let guest_chat: Option<i32> =
        sqlx::query_scalar("SELECT id FROM chats WHERE guest_id = $1 FOR UPDATE")
            .bind(guest)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(guest_chat) = guest_chat else {
        return Ok(());
    };

    sqlx::query(
        r"
        UPDATE messages SET author = 'user', user_id = $2, guest_id = NULL
        WHERE chat_id = $1 AND author = 'guest'
        ",
    )
    .bind(guest_chat)
    .bind(user)
    .execute(&mut *conn)
    .await?;

    let user_chat: Option<i32> =
        sqlx::query_scalar("SELECT id FROM chats WHERE user_id = $1 FOR UPDATE")
            .bind(user)
            .fetch_optional(&mut *conn)
            .await?;

    let Some(user_chat) = user_chat else {
        sqlx::query("UPDATE chats SET user_id = $2, guest_id = NULL WHERE id = $1")
            .bind(guest_chat)
            .bind(user)
            .execute(&mut *conn)
            .await?;
        return Ok(());
    };

    // Unlink first: latest_message_id is unique across chats.
    sqlx::query("UPDATE chats SET latest_message_id = NULL WHERE id = $1")
        .bind(guest_chat)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE messages SET chat_id = $2 WHERE chat_id = $1")
        .bind(guest_chat)
        .bind(user_chat)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r"
        UPDATE chats SET latest_message_id = (
            SELECT id FROM messages WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC LIMIT 1
        )
        WHERE id = $1
        ",
    )
    .bind(user_chat)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM chats WHERE id = $1")
        .bind(guest_chat)
        .execute(conn)
        .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_requires_all_user_columns() {
        assert!(profile_from_columns(None, None, None, None).is_none());
        let profile = profile_from_columns(
            Some("Ada".to_owned()),
            Some("Lovelace".to_owned()),
            Some("ada@example.com".to_owned()),
            None,
        )
        .unwrap();
        assert_eq!(profile.first_name, "Ada");
        assert!(profile.profile_photo.is_none());
    }

    #[test]
    fn test_assistant_message_uses_assistant_profile() {
        let row = MessageRow {
            id: 1,
            chat_id: 2,
            content: "Try the blue one".to_owned(),
            author: MessageAuthor::Assistant,
            user_id: None,
            guest_id: None,
            created_at: Utc::now(),
            first_name: None,
            last_name: None,
            email: None,
            profile_photo: None,
        };
        let message = ChatMessage::from(row);
        assert_eq!(message.profile, Some(AuthorProfile::assistant()));
    }
}
