//! Guest identity issuance.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tower_sessions::Session;
use tracing::info;

use shoppingify_core::GuestId;

use crate::db::GuestRepository;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::middleware::identity::pin_guest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct GuestResponse {
    pub guest_id: GuestId,
}

/// Issue a guest token.
///
/// POST /api/guests
///
/// Clients without cookies send the token back in `X-Guest-Id`.
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<(StatusCode, Json<GuestResponse>)> {
    if user.is_some() {
        return Err(AppError::BadRequest(
            "Cannot create guest while logged in.".to_owned(),
        ));
    }

    let guest_id = GuestRepository::new(state.pool()).create().await?;
    pin_guest(&session, guest_id).await?;
    info!(guest = %guest_id, "Guest issued");

    Ok((StatusCode::CREATED, Json(GuestResponse { guest_id })))
}
