//! Who owns a cart or a chat.

use serde::{Deserialize, Serialize};

use super::id::{GuestId, UserId};

/// The identity a draft order or chat belongs to.
///
/// Exactly one of the two columns is set in the database; this enum is the
/// in-memory form of that constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Owner {
    User(UserId),
    Guest(GuestId),
}

impl Owner {
    #[must_use]
    pub const fn user_id(self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(id),
            Self::Guest(_) => None,
        }
    }

    #[must_use]
    pub const fn guest_id(self) -> Option<GuestId> {
        match self {
            Self::User(_) => None,
            Self::Guest(id) => Some(id),
        }
    }

    #[must_use]
    pub const fn is_guest(self) -> bool {
        matches!(self, Self::Guest(_))
    }

    /// Rebuild from the two nullable owner columns.
    ///
    /// Returns `None` unless exactly one is set.
    #[must_use]
    pub const fn from_columns(user_id: Option<UserId>, guest_id: Option<GuestId>) -> Option<Self> {
        match (user_id, guest_id) {
            (Some(user), None) => Some(Self::User(user)),
            (None, Some(guest)) => Some(Self::Guest(guest)),
            _ => None,
        }
    }
}

impl From<UserId> for Owner {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<GuestId> for Owner {
    fn from(id: GuestId) -> Self {
        Self::Guest(id)
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}
