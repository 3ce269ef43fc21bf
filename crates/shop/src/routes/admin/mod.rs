//! Staff-only API: support chat inbox and search index controls.
//!
//! Every handler takes [`RequireStaff`](crate::middleware::RequireStaff).

pub mod chats;
pub mod search_index;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Routes mounted under `/api/admin`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chats", get(chats::list))
        .route("/chats/{id}", get(chats::show))
        .route("/chats/{id}/messages", post(chats::reply))
        .route("/search-index", get(search_index::status))
        .route("/search-index/rebuild", post(search_index::rebuild))
}
