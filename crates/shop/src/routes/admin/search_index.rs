//! Search index status and manual rebuilds.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::middleware::RequireStaff;
use crate::search::LastRebuild;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub documents: u64,
    pub rebuild_in_progress: bool,
    pub last_rebuild: Option<LastRebuild>,
}

/// GET /api/admin/search-index
pub async fn status(
    State(state): State<AppState>,
    RequireStaff(_staff): RequireStaff,
) -> Json<IndexStatus> {
    Json(IndexStatus {
        ready: state.search().is_ready(),
        documents: state.search().num_docs(),
        rebuild_in_progress: state.rebuilds().in_progress(),
        last_rebuild: state.rebuilds().last_rebuild().await,
    })
}

/// Schedule a rebuild.
///
/// POST /api/admin/search-index/rebuild
pub async fn rebuild(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> (StatusCode, Json<Value>) {
    info!(staff = %staff.id, "Manual search index rebuild requested");
    state
        .rebuilds()
        .schedule(format!("manual rebuild by {}", staff.email));

    (
        StatusCode::ACCEPTED,
        Json(json!({ "detail": "Rebuild scheduled." })),
    )
}
