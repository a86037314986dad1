//! Persistence contract for teams, members, payments and volunteers.
//!
//! The reconciler and the registration orchestrator only talk to the
//! [`Store`] trait. Two implementations exist: [`PgStore`] for production
//! and [`MemoryStore`] for tests and local runs. Both enforce the unique
//! `(provider, provider_ref)` and `reference` keys themselves, and both
//! make [`Store::transition_payment`] a single atomic compare-and-set so
//! concurrent webhook deliveries cannot race a payment into two states.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    Member, NewPayment, NewTeam, NewVolunteer, Payment, PaymentStatus, Team, TeamDetail,
    TeamPatch, TeamStats, TeamStatus, Volunteer, VolunteerStats,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the team and all of its members as one unit.
    async fn create_team(&self, team: NewTeam) -> StoreResult<Team>;
    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>>;
    async fn team_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>>;
    /// All teams, newest first, each with members and latest payment.
    async fn list_team_details(&self) -> StoreResult<Vec<TeamDetail>>;
    async fn update_team(&self, id: Uuid, patch: TeamPatch) -> StoreResult<Option<Team>>;
    /// Returns `false` when no team has this id.
    async fn set_team_status(&self, id: Uuid, status: TeamStatus) -> StoreResult<bool>;
    async fn team_stats(&self) -> StoreResult<TeamStats>;

    /// Fails with [`StoreError::Conflict`] when `(provider, provider_ref)` or
    /// `reference` is already taken.
    async fn create_payment(&self, payment: NewPayment) -> StoreResult<Payment>;
    /// Looks a payment up by provider and a correlation key, matching the
    /// provider reference first and the local reference second.
    async fn find_payment(&self, provider: &str, key: &str) -> StoreResult<Option<Payment>>;
    async fn latest_payment(&self, team_id: Uuid) -> StoreResult<Option<Payment>>;
    /// Moves an INITIATED payment to `to`, storing `raw_payload`. Returns
    /// `None` without writing when the payment is no longer INITIATED.
    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
        raw_payload: &Value,
    ) -> StoreResult<Option<Payment>>;
    /// Overwrites the audit payload only; status is untouched.
    async fn record_payment_payload(&self, id: Uuid, raw_payload: &Value) -> StoreResult<()>;
    /// SUCCESS payments whose team is still PENDING and has not been written
    /// since the payment last changed. A later admin edit takes precedence.
    async fn paid_payments_for_pending_teams(&self) -> StoreResult<Vec<Payment>>;

    async fn create_volunteer(&self, volunteer: NewVolunteer) -> StoreResult<Volunteer>;
    async fn find_volunteer_by_ref(&self, ref_code: &str) -> StoreResult<Option<Volunteer>>;
    /// All volunteers, newest first, with attributed and paid team counts.
    async fn list_volunteers(&self) -> StoreResult<Vec<VolunteerStats>>;

    async fn ping(&self) -> bool;

    async fn team_detail(&self, id: Uuid) -> StoreResult<Option<TeamDetail>> {
        let Some(team) = self.get_team(id).await? else {
            return Ok(None);
        };
        let members = self.team_members(id).await?;
        let payment = self.latest_payment(id).await?;
        Ok(Some(TeamDetail {
            team,
            members,
            payment,
        }))
    }
}
