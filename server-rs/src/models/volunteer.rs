use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub ref_code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVolunteer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub ref_code: String,
}

#[derive(Debug, Clone)]
pub struct VolunteerStats {
    pub volunteer: Volunteer,
    pub teams_count: i64,
    pub paid_teams_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateVolunteerRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}
