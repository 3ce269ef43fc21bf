//! User domain types.

use chrono::{DateTime, Utc};

use shoppingify_core::{Email, UserId};

/// A registered customer or staff member.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    /// Absolute URL of the profile photo.
    pub profile_photo: Option<String>,
    /// Staff users can read and answer every chat.
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
