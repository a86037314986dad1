use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{RegisterTeamRequest, TeamDetail};
use crate::services::registration::{PaymentInitiation, Registration};
use crate::AppState;

pub async fn register_team(
    State(state): State<AppState>,
    payload: Result<Json<RegisterTeamRequest>, JsonRejection>,
) -> AppResult<Json<Registration>> {
    let Json(req) = payload?;
    let registration = state.registrar.register(req).await?;
    Ok(Json(registration))
}

/// Hands back a payment link for a team that has not paid yet.
pub async fn retry_payment(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> AppResult<Json<PaymentInitiation>> {
    let payment = state.registrar.retry_payment(team_id).await?;
    Ok(Json(payment))
}

pub async fn team_receipt(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
) -> AppResult<Json<TeamDetail>> {
    state
        .store
        .team_detail(team_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Team not found".into()))
}
