use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::ADMIN_STATS_KEY;
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateVolunteerRequest, Member, NewVolunteer, Payment, Team, TeamDetail, TeamPatch, TeamStats,
    Volunteer, VolunteerStats,
};
use crate::store::StoreError;
use crate::AppState;

const REF_CODE_ATTEMPTS: usize = 5;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// Exchanges the admin password for the static bearer token.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let admin = &state.config.admin;
    let (Some(expected), Some(token)) = (admin.password.as_deref(), admin.token.as_deref()) else {
        return Err(AppError::Configuration("Admin not configured".into()));
    };

    if body.password != expected {
        tracing::warn!("Admin login rejected");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }
    Ok(Json(json!({ "token": token })))
}

#[derive(Serialize)]
pub struct AdminTeamView {
    #[serde(flatten)]
    pub team: Team,
    pub members: Vec<Member>,
    pub payment: Option<Payment>,
}

impl From<TeamDetail> for AdminTeamView {
    fn from(d: TeamDetail) -> Self {
        Self {
            team: d.team,
            members: d.members,
            payment: d.payment,
        }
    }
}

pub async fn list_teams(State(state): State<AppState>) -> AppResult<Json<Vec<AdminTeamView>>> {
    let teams = state.store.list_team_details().await?;
    Ok(Json(teams.into_iter().map(AdminTeamView::from).collect()))
}

pub async fn update_team(
    State(state): State<AppState>,
    Path(team_id): Path<Uuid>,
    payload: Result<Json<TeamPatch>, JsonRejection>,
) -> AppResult<Json<Team>> {
    let Json(patch) = payload?;
    let team = state
        .store
        .update_team(team_id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".into()))?;

    tracing::info!(team_id = %team.id, status = %team.status.as_str(), "Team updated by admin");
    if let Some(cache) = &state.cache {
        cache.del(ADMIN_STATS_KEY).await;
    }
    Ok(Json(team))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub ref_code: String,
    pub registration_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teams_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_teams_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl VolunteerView {
    fn new(state: &AppState, v: Volunteer) -> Self {
        Self {
            registration_link: state.config.registration_link(&v.ref_code),
            id: v.id,
            name: v.name,
            email: v.email,
            phone: v.phone,
            ref_code: v.ref_code,
            teams_count: None,
            paid_teams_count: None,
            created_at: v.created_at,
        }
    }

    fn with_stats(state: &AppState, s: VolunteerStats) -> Self {
        Self {
            teams_count: Some(s.teams_count),
            paid_teams_count: Some(s.paid_teams_count),
            ..Self::new(state, s.volunteer)
        }
    }
}

fn generate_ref_code() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

pub async fn create_volunteer(
    State(state): State<AppState>,
    payload: Result<Json<CreateVolunteerRequest>, JsonRejection>,
) -> AppResult<Json<VolunteerView>> {
    let Json(req) = payload?;
    let (name, email, phone) = (req.name.trim(), req.email.trim(), req.phone.trim());
    if name.is_empty() || email.is_empty() || phone.is_empty() {
        return Err(AppError::BadRequest(
            "Name, email and phone are required".into(),
        ));
    }

    for _ in 0..REF_CODE_ATTEMPTS {
        let ref_code = generate_ref_code();
        if state.store.find_volunteer_by_ref(&ref_code).await?.is_some() {
            continue;
        }
        let created = state
            .store
            .create_volunteer(NewVolunteer {
                name: name.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                ref_code,
            })
            .await;
        match created {
            Ok(v) => {
                tracing::info!(volunteer_id = %v.id, ref_code = %v.ref_code, "Volunteer created");
                if let Some(cache) = &state.cache {
                    cache.del(ADMIN_STATS_KEY).await;
                }
                return Ok(Json(VolunteerView::new(&state, v)));
            }
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(
        "Failed to generate unique volunteer link".into(),
    ))
}

pub async fn list_volunteers(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<VolunteerView>>> {
    let volunteers = state.store.list_volunteers().await?;
    Ok(Json(
        volunteers
            .into_iter()
            .map(|s| VolunteerView::with_stats(&state, s))
            .collect(),
    ))
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<TeamStats>> {
    if let Some(cache) = &state.cache {
        if let Some(cached) = cache.get_json::<TeamStats>(ADMIN_STATS_KEY).await {
            return Ok(Json(cached));
        }
    }

    let stats = state.store.team_stats().await?;
    if let Some(cache) = &state.cache {
        cache
            .set_json(ADMIN_STATS_KEY, &stats, state.config.redis.stats_ttl_secs)
            .await;
    }
    Ok(Json(stats))
}
