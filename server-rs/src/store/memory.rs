use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Member, NewPayment, NewTeam, NewVolunteer, Payment, PaymentStatus, Team, TeamDetail,
    TeamPatch, TeamStats, TeamStatus, Volunteer, VolunteerStats,
};

#[derive(Default)]
struct Tables {
    teams: Vec<Team>,
    members: Vec<Member>,
    payments: Vec<Payment>,
    volunteers: Vec<Volunteer>,
}

impl Tables {
    fn latest_payment(&self, team_id: Uuid) -> Option<&Payment> {
        self.payments.iter().rev().find(|p| p.team_id == team_id)
    }

    fn members_of(&self, team_id: Uuid) -> Vec<Member> {
        let mut members: Vec<Member> = self
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        members
    }

    fn team_has_success(&self, team_id: Uuid) -> bool {
        self.payments
            .iter()
            .any(|p| p.team_id == team_id && p.status == PaymentStatus::Success)
    }
}

/// A thread-safe in-memory store.
///
/// A single `RwLock` guards every table, so each trait call is atomic with
/// respect to the others. Rows are kept in insertion order, which stands in
/// for `created_at` ordering.
#[derive(Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.read().await.payments.clone()
    }

    pub async fn teams(&self) -> Vec<Team> {
        self.tables.read().await.teams.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_team(&self, team: NewTeam) -> StoreResult<Team> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let created = Team {
            id: Uuid::new_v4(),
            team_name: team.team_name,
            institution: team.institution,
            lead_name: team.lead.name,
            lead_email: team.lead.email,
            lead_phone: team.lead.phone,
            lead_role: team.lead.role,
            status: TeamStatus::Pending,
            volunteer_id: team.volunteer_id,
            created_at: now,
            updated_at: now,
        };
        for m in team.members {
            tables.members.push(Member {
                id: Uuid::new_v4(),
                team_id: created.id,
                name: m.name,
                email: m.email,
                role: m.role,
            });
        }
        tables.teams.push(created.clone());
        Ok(created)
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let tables = self.tables.read().await;
        Ok(tables.teams.iter().find(|t| t.id == id).cloned())
    }

    async fn team_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>> {
        Ok(self.tables.read().await.members_of(team_id))
    }

    async fn list_team_details(&self) -> StoreResult<Vec<TeamDetail>> {
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .iter()
            .rev()
            .map(|t| TeamDetail {
                team: t.clone(),
                members: tables.members_of(t.id),
                payment: tables.latest_payment(t.id).cloned(),
            })
            .collect())
    }

    async fn update_team(&self, id: Uuid, patch: TeamPatch) -> StoreResult<Option<Team>> {
        let mut tables = self.tables.write().await;
        let Some(team) = tables.teams.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        patch.apply(team);
        team.updated_at = Utc::now();
        Ok(Some(team.clone()))
    }

    async fn set_team_status(&self, id: Uuid, status: TeamStatus) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.teams.iter_mut().find(|t| t.id == id) {
            Some(team) => {
                team.status = status;
                team.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn team_stats(&self) -> StoreResult<TeamStats> {
        let tables = self.tables.read().await;
        let count = |s: TeamStatus| tables.teams.iter().filter(|t| t.status == s).count() as i64;
        Ok(TeamStats {
            teams: tables.teams.len() as i64,
            paid_teams: count(TeamStatus::Paid),
            pending_teams: count(TeamStatus::Pending),
            volunteers: tables.volunteers.len() as i64,
        })
    }

    async fn create_payment(&self, payment: NewPayment) -> StoreResult<Payment> {
        let mut tables = self.tables.write().await;
        let taken = tables.payments.iter().any(|p| {
            (p.provider == payment.provider && p.provider_ref == payment.provider_ref)
                || p.reference == payment.reference
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "payment: ({}, {}) or reference {} already exists",
                payment.provider, payment.provider_ref, payment.reference
            )));
        }
        if !tables.teams.iter().any(|t| t.id == payment.team_id) {
            return Err(StoreError::Conflict(format!(
                "payment: team {} does not exist",
                payment.team_id
            )));
        }

        let now = Utc::now();
        let created = Payment {
            id: Uuid::new_v4(),
            team_id: payment.team_id,
            amount: payment.amount,
            currency: payment.currency,
            provider: payment.provider,
            provider_ref: payment.provider_ref,
            reference: payment.reference,
            status: PaymentStatus::Initiated,
            raw_payload: payment.raw_payload,
            created_at: now,
            updated_at: now,
        };
        tables.payments.push(created.clone());
        Ok(created)
    }

    async fn find_payment(&self, provider: &str, key: &str) -> StoreResult<Option<Payment>> {
        let tables = self.tables.read().await;
        let of_provider = || tables.payments.iter().filter(|p| p.provider == provider);
        Ok(of_provider()
            .find(|p| p.provider_ref == key)
            .or_else(|| of_provider().rev().find(|p| p.reference == key))
            .cloned())
    }

    async fn latest_payment(&self, team_id: Uuid) -> StoreResult<Option<Payment>> {
        Ok(self.tables.read().await.latest_payment(team_id).cloned())
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
        raw_payload: &Value,
    ) -> StoreResult<Option<Payment>> {
        let mut tables = self.tables.write().await;
        let Some(payment) = tables.payments.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if payment.status != PaymentStatus::Initiated {
            return Ok(None);
        }
        payment.status = to;
        payment.raw_payload = raw_payload.clone();
        payment.updated_at = Utc::now();
        Ok(Some(payment.clone()))
    }

    async fn record_payment_payload(&self, id: Uuid, raw_payload: &Value) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(payment) = tables.payments.iter_mut().find(|p| p.id == id) {
            payment.raw_payload = raw_payload.clone();
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn paid_payments_for_pending_teams(&self) -> StoreResult<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Success)
            .filter(|p| {
                tables
                    .teams
                    .iter()
                    .any(|t| {
                        t.id == p.team_id
                            && t.status == TeamStatus::Pending
                            && p.updated_at >= t.updated_at
                    })
            })
            .cloned()
            .collect())
    }

    async fn create_volunteer(&self, volunteer: NewVolunteer) -> StoreResult<Volunteer> {
        let mut tables = self.tables.write().await;
        if tables.volunteers.iter().any(|v| v.ref_code == volunteer.ref_code) {
            return Err(StoreError::Conflict(format!(
                "volunteer: ref code {} already exists",
                volunteer.ref_code
            )));
        }
        let created = Volunteer {
            id: Uuid::new_v4(),
            name: volunteer.name,
            email: volunteer.email,
            phone: volunteer.phone,
            ref_code: volunteer.ref_code,
            created_at: Utc::now(),
        };
        tables.volunteers.push(created.clone());
        Ok(created)
    }

    async fn find_volunteer_by_ref(&self, ref_code: &str) -> StoreResult<Option<Volunteer>> {
        let tables = self.tables.read().await;
        Ok(tables.volunteers.iter().find(|v| v.ref_code == ref_code).cloned())
    }

    async fn list_volunteers(&self) -> StoreResult<Vec<VolunteerStats>> {
        let tables = self.tables.read().await;
        Ok(tables
            .volunteers
            .iter()
            .rev()
            .map(|v| {
                let teams: Vec<&Team> = tables
                    .teams
                    .iter()
                    .filter(|t| t.volunteer_id == Some(v.id))
                    .collect();
                let paid = teams.iter().filter(|t| tables.team_has_success(t.id)).count();
                VolunteerStats {
                    volunteer: v.clone(),
                    teams_count: teams.len() as i64,
                    paid_teams_count: paid as i64,
                }
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }
}
