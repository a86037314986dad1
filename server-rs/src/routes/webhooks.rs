use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde_json::{json, Value};

use crate::cache::ADMIN_STATS_KEY;
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Fapshi payment notifications. Anything the reconciler can settle or has
/// to ignore is acknowledged; only a store failure asks for redelivery.
pub async fn fapshi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(state.config.fapshi.signature_header.as_str())
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .reconciler
        .reconcile(&body, signature)
        .await
        .map_err(|e| AppError::Internal(format!("webhook processing failed: {e}")))?;

    tracing::debug!(?outcome, "Webhook handled");
    if outcome.team_marked_paid() {
        if let Some(cache) = &state.cache {
            cache.del(ADMIN_STATS_KEY).await;
        }
    }

    Ok(Json(json!({ "received": true })))
}
