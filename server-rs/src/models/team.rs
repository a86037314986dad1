use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payment::Payment;

/// Team lifecycle status. Only `Pending -> Paid` is driven by payments; any
/// other value is set by an administrator and carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TeamStatus {
    Pending,
    Paid,
    Other(String),
}

impl TeamStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TeamStatus::Pending => "PENDING",
            TeamStatus::Paid => "PAID",
            TeamStatus::Other(s) => s,
        }
    }
}

impl From<String> for TeamStatus {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => TeamStatus::Pending,
            "PAID" => TeamStatus::Paid,
            other => TeamStatus::Other(other.to_string()),
        }
    }
}

impl From<TeamStatus> for String {
    fn from(s: TeamStatus) -> Self {
        s.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub team_name: String,
    pub institution: Option<String>,
    pub lead_name: String,
    pub lead_email: String,
    pub lead_phone: String,
    pub lead_role: String,
    pub status: TeamStatus,
    pub volunteer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    /// Last write to the row, by an admin edit or a status change.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: Uuid,
    pub team_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterTeamRequest {
    #[serde(rename = "teamName", default)]
    pub team_name: String,
    pub institution: Option<String>,
    #[serde(default)]
    pub lead: LeadInput,
    #[serde(default)]
    pub members: Vec<MemberInput>,
    #[serde(rename = "refCode", alias = "ref")]
    pub ref_code: Option<String>,
}

/// A validated team ready to be persisted together with its members.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub team_name: String,
    pub institution: Option<String>,
    pub lead: LeadInput,
    pub members: Vec<MemberInput>,
    pub volunteer_id: Option<Uuid>,
}

/// Admin partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPatch {
    pub team_name: Option<String>,
    pub institution: Option<String>,
    pub lead_name: Option<String>,
    pub lead_email: Option<String>,
    pub lead_phone: Option<String>,
    pub lead_role: Option<String>,
    pub status: Option<TeamStatus>,
}

impl TeamPatch {
    pub fn apply(self, team: &mut Team) {
        if let Some(v) = self.team_name {
            team.team_name = v;
        }
        if let Some(v) = self.institution {
            team.institution = Some(v);
        }
        if let Some(v) = self.lead_name {
            team.lead_name = v;
        }
        if let Some(v) = self.lead_email {
            team.lead_email = v;
        }
        if let Some(v) = self.lead_phone {
            team.lead_phone = v;
        }
        if let Some(v) = self.lead_role {
            team.lead_role = v;
        }
        if let Some(v) = self.status {
            team.status = v;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamDetail {
    pub team: Team,
    pub members: Vec<Member>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamStats {
    pub teams: i64,
    pub paid_teams: i64,
    pub pending_teams: i64,
    pub volunteers: i64,
}
