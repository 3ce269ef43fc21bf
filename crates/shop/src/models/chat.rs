//! Support chat domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use shoppingify_core::{ChatId, GuestId, MessageAuthor, MessageId, Owner, UserId};

/// One support conversation per user or guest.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: ChatId,
    pub owner: Owner,
    pub latest_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

/// Public profile shown next to a message or chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_photo: Option<String>,
}

impl AuthorProfile {
    /// Profile used for assistant replies.
    #[must_use]
    pub fn assistant() -> Self {
        Self {
            first_name: "Shopping".to_owned(),
            last_name: "Assistant".to_owned(),
            email: String::new(),
            profile_photo: None,
        }
    }
}

/// A chat message with its author's public profile.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub content: String,
    pub author: MessageAuthor,
    pub user_id: Option<UserId>,
    pub guest_id: Option<GuestId>,
    /// `None` for guest authors.
    pub profile: Option<AuthorProfile>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether `viewer` wrote this message.
    #[must_use]
    pub fn is_written_by(&self, viewer: Owner) -> bool {
        match (self.author, viewer) {
            (MessageAuthor::User, Owner::User(id)) => self.user_id == Some(id),
            (MessageAuthor::Guest, Owner::Guest(id)) => self.guest_id == Some(id),
            _ => false,
        }
    }
}

/// A chat as listed on the admin dashboard.
#[derive(Debug, Clone)]
pub struct ChatSummary {
    pub chat: Chat,
    /// `None` when the chat belongs to a guest.
    pub owner_profile: Option<AuthorProfile>,
    pub latest_message: Option<ChatMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author: MessageAuthor, user: Option<i32>, guest: Option<GuestId>) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(1),
            chat_id: ChatId::new(1),
            content: "hi".to_owned(),
            author,
            user_id: user.map(UserId::new),
            guest_id: guest,
            profile: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_written_by() {
        let guest = GuestId::generate();
        let from_guest = message(MessageAuthor::Guest, None, Some(guest));
        assert!(from_guest.is_written_by(Owner::Guest(guest)));
        assert!(!from_guest.is_written_by(Owner::Guest(GuestId::generate())));
        assert!(!from_guest.is_written_by(Owner::User(UserId::new(1))));

        let from_user = message(MessageAuthor::User, Some(4), None);
        assert!(from_user.is_written_by(Owner::User(UserId::new(4))));
        assert!(!from_user.is_written_by(Owner::User(UserId::new(5))));

        let from_bot = message(MessageAuthor::Assistant, None, None);
        assert!(!from_bot.is_written_by(Owner::User(UserId::new(4))));
    }
}
