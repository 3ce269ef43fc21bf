//! Session-related types.
//!
//! Types stored in the session for identity state.

use serde::{Deserialize, Serialize};

use shoppingify_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Whether the user may use the admin endpoints.
    pub is_staff: bool,
}

/// Session keys for identity data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous shopper's guest token.
    pub const GUEST_TOKEN: &str = "guest_token";
}
