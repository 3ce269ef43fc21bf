//! Stripe webhook receiver.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::db::PaymentRepository;
use crate::error::{AppError, Result};
use crate::services::payments::webhook::verify_event;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Receive a Stripe event.
///
/// POST /api/payments/stripe/webhook
///
/// Only `payment_intent.succeeded` changes state; other events are
/// acknowledged and ignored.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let secret = state
        .config()
        .stripe
        .as_ref()
        .and_then(|s| s.webhook_secret.as_ref())
        .ok_or_else(|| AppError::ServiceUnavailable("Webhooks are not configured.".to_owned()))?;

    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let event = verify_event(
        &body,
        header,
        secret.expose_secret(),
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected webhook");
        AppError::BadRequest(e.to_string())
    })?;

    if let Some(intent_id) = event.succeeded_intent() {
        match PaymentRepository::new(state.pool())
            .mark_succeeded(intent_id)
            .await?
        {
            Some(order_id) => info!(%order_id, intent_id, "Payment succeeded"),
            None => warn!(intent_id, "Payment intent matches no order"),
        }
    }

    Ok(Json(json!({ "received": true })))
}
