//! Identity extractors.
//!
//! Every shopper is either a logged-in user (stored in the session) or a
//! guest identified by a token. Handlers pick the extractor matching what
//! they need:
//!
//! - [`RequireAuth`]: a logged-in user, 401 otherwise
//! - [`RequireStaff`]: a logged-in staff user, 401/403 otherwise
//! - [`OptionalAuth`]: the logged-in user if any
//! - [`Requester`]: the user or guest owning carts and chats, creating a
//!   guest when the request carries no identity

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{debug, info};

use shoppingify_core::{GuestId, Owner};

use crate::db::GuestRepository;
use crate::error::AppError;
use crate::models::CurrentUser;
use crate::models::session::keys;
use crate::state::AppState;

/// Header carrying an explicit guest token.
pub const GUEST_ID_HEADER: &str = "x-guest-id";

const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
const NOT_STAFF: &str = "You do not have permission to perform this action.";

fn session_from(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))
}

fn session_error(err: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {err}"))
}

async fn current_user(session: &Session) -> Result<Option<CurrentUser>, AppError> {
    session
        .get::<CurrentUser>(keys::CURRENT_USER)
        .await
        .map_err(session_error)
}

/// Extractor that requires a logged-in user.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        current_user(&session)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized(NOT_AUTHENTICATED.to_owned()))
    }
}

/// Extractor that requires a logged-in staff user.
pub struct RequireStaff(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_staff {
            return Err(AppError::Forbidden(NOT_STAFF.to_owned()));
        }
        Ok(Self(user))
    }
}

/// Extractor for the logged-in user, if any.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        Ok(Self(current_user(&session).await?))
    }
}

#[derive(Debug, Deserialize)]
struct GuestQuery {
    guest_id: Option<String>,
}

/// The identity owning the request's cart and chat.
///
/// Resolution order: session user, session guest token, a guest token passed
/// in the `X-Guest-Id` header or `guest_id` query parameter, and finally a
/// newly created guest. Tokens that come from outside the session are pinned
/// into it once validated.
#[derive(Debug, Clone, Copy)]
pub struct Requester(pub Owner);

impl FromRequestParts<AppState> for Requester {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;

        if let Some(user) = current_user(&session).await? {
            return Ok(Self(Owner::User(user.id)));
        }

        let guests = GuestRepository::new(state.pool());

        if let Some(guest) = pinned_guest(&session).await? {
            if guests.exists(guest).await? {
                return Ok(Self(Owner::Guest(guest)));
            }
            debug!(%guest, "Session guest no longer exists");
        }

        if let Some(guest) = explicit_guest_token(parts) {
            if guests.exists(guest).await? {
                pin_guest(&session, guest).await?;
                return Ok(Self(Owner::Guest(guest)));
            }
            debug!(%guest, "Ignoring unknown guest token");
        }

        let guest = guests.create().await?;
        pin_guest(&session, guest).await?;
        info!(%guest, "Guest created");
        Ok(Self(Owner::Guest(guest)))
    }
}

/// Guest token passed explicitly by the client.
fn explicit_guest_token(parts: &Parts) -> Option<GuestId> {
    let from_header = parts
        .headers
        .get(GUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let raw = from_header.or_else(|| {
        Query::<GuestQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.guest_id)
    })?;

    GuestId::parse(&raw)
}

/// Pin a guest token into the session.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be written.
pub async fn pin_guest(session: &Session, guest: GuestId) -> Result<(), AppError> {
    session
        .insert(keys::GUEST_TOKEN, guest)
        .await
        .map_err(session_error)
}

/// The session's guest token, left in place.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be read.
pub async fn pinned_guest(session: &Session) -> Result<Option<GuestId>, AppError> {
    session
        .get::<GuestId>(keys::GUEST_TOKEN)
        .await
        .map_err(session_error)
}

/// Remove and return the session's guest token.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be read.
pub async fn take_guest(session: &Session) -> Result<Option<GuestId>, AppError> {
    session
        .remove::<GuestId>(keys::GUEST_TOKEN)
        .await
        .map_err(session_error)
}

/// Store the logged-in user in the session.
///
/// The session id is cycled to prevent fixation.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be written.
pub async fn set_current_user(session: &Session, user: &CurrentUser) -> Result<(), AppError> {
    session.cycle_id().await.map_err(session_error)?;
    session
        .insert(keys::CURRENT_USER, user)
        .await
        .map_err(session_error)
}

/// Clear the whole session.
///
/// # Errors
///
/// Returns `AppError::Internal` if the session cannot be flushed.
pub async fn clear_current_user(session: &Session) -> Result<(), AppError> {
    session.flush().await.map_err(session_error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_guest_token_from_header() {
        let guest = GuestId::generate();
        let head = parts(
            Request::builder()
                .uri("/api/cart/current")
                .header(GUEST_ID_HEADER, guest.to_string()),
        );
        assert_eq!(explicit_guest_token(&head), Some(guest));
    }

    #[test]
    fn test_guest_token_from_query() {
        let guest = GuestId::generate();
        let head = parts(Request::builder().uri(format!("/ws/chat?guest_id={guest}")));
        assert_eq!(explicit_guest_token(&head), Some(guest));
    }

    #[test]
    fn test_header_wins_over_query() {
        let header = GuestId::generate();
        let query = GuestId::generate();
        let head = parts(
            Request::builder()
                .uri(format!("/api/cart/items?guest_id={query}"))
                .header(GUEST_ID_HEADER, header.to_string()),
        );
        assert_eq!(explicit_guest_token(&head), Some(header));
    }

    #[test]
    fn test_malformed_guest_token_is_ignored() {
        let with_junk = parts(
            Request::builder()
                .uri("/api/cart/items")
                .header(GUEST_ID_HEADER, "not-a-uuid"),
        );
        assert_eq!(explicit_guest_token(&with_junk), None);

        let bare = parts(Request::builder().uri("/api/cart/items"));
        assert_eq!(explicit_guest_token(&bare), None);
    }
}
