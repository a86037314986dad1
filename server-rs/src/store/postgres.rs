use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Member, NewPayment, NewTeam, NewVolunteer, Payment, PaymentStatus, Team, TeamDetail,
    TeamPatch, TeamStats, TeamStatus, Volunteer, VolunteerStats,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    team_name: String,
    institution: Option<String>,
    lead_name: String,
    lead_email: String,
    lead_phone: String,
    lead_role: String,
    status: String,
    volunteer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TeamRow> for Team {
    fn from(r: TeamRow) -> Self {
        Team {
            id: r.id,
            team_name: r.team_name,
            institution: r.institution,
            lead_name: r.lead_name,
            lead_email: r.lead_email,
            lead_phone: r.lead_phone,
            lead_role: r.lead_role,
            status: TeamStatus::from(r.status),
            volunteer_id: r.volunteer_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    team_id: Uuid,
    name: String,
    email: String,
    role: Option<String>,
}

impl From<MemberRow> for Member {
    fn from(r: MemberRow) -> Self {
        Member {
            id: r.id,
            team_id: r.team_id,
            name: r.name,
            email: r.email,
            role: r.role,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    team_id: Uuid,
    amount: i64,
    currency: String,
    provider: String,
    provider_ref: String,
    reference: String,
    status: String,
    raw_payload: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;

    fn try_from(r: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&r.status).ok_or_else(|| {
            StoreError::Corrupt(format!("payment {} has status {:?}", r.id, r.status))
        })?;
        Ok(Payment {
            id: r.id,
            team_id: r.team_id,
            amount: r.amount,
            currency: r.currency,
            provider: r.provider,
            provider_ref: r.provider_ref,
            reference: r.reference,
            status,
            raw_payload: r.raw_payload,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VolunteerRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    ref_code: String,
    created_at: DateTime<Utc>,
}

impl From<VolunteerRow> for Volunteer {
    fn from(r: VolunteerRow) -> Self {
        Volunteer {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            ref_code: r.ref_code,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VolunteerStatsRow {
    #[sqlx(flatten)]
    volunteer: VolunteerRow,
    teams_count: i64,
    paid_teams_count: i64,
}

fn map_unique(e: sqlx::Error, what: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{what}: {}", db.message()))
        }
        _ => StoreError::Database(e),
    }
}

fn payments(rows: Vec<PaymentRow>) -> StoreResult<Vec<Payment>> {
    rows.into_iter().map(Payment::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn create_team(&self, team: NewTeam) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;

        let row: TeamRow = sqlx::query_as(
            r#"INSERT INTO teams (id, team_name, institution, lead_name, lead_email, lead_phone, lead_role, status, volunteer_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'PENDING', $8, NOW(), NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&team.team_name)
        .bind(&team.institution)
        .bind(&team.lead.name)
        .bind(&team.lead.email)
        .bind(&team.lead.phone)
        .bind(&team.lead.role)
        .bind(team.volunteer_id)
        .fetch_one(&mut *tx)
        .await?;

        for m in &team.members {
            sqlx::query(
                "INSERT INTO team_members (id, team_id, name, email, role) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(row.id)
            .bind(&m.name)
            .bind(&m.email)
            .bind(&m.role)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row: Option<TeamRow> = sqlx::query_as("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Team::from))
    }

    async fn team_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>> {
        let rows: Vec<MemberRow> =
            sqlx::query_as("SELECT * FROM team_members WHERE team_id = $1 ORDER BY name")
                .bind(team_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn list_team_details(&self) -> StoreResult<Vec<TeamDetail>> {
        let teams: Vec<TeamRow> = sqlx::query_as("SELECT * FROM teams ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let member_rows: Vec<MemberRow> =
            sqlx::query_as("SELECT * FROM team_members ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        let payment_rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT DISTINCT ON (team_id) * FROM payments ORDER BY team_id, created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut members: HashMap<Uuid, Vec<Member>> = HashMap::new();
        for m in member_rows {
            members.entry(m.team_id).or_default().push(m.into());
        }
        let mut latest: HashMap<Uuid, Payment> = HashMap::new();
        for p in payments(payment_rows)? {
            latest.insert(p.team_id, p);
        }

        Ok(teams
            .into_iter()
            .map(|row| {
                let team = Team::from(row);
                TeamDetail {
                    members: members.remove(&team.id).unwrap_or_default(),
                    payment: latest.remove(&team.id),
                    team,
                }
            })
            .collect())
    }

    async fn update_team(&self, id: Uuid, patch: TeamPatch) -> StoreResult<Option<Team>> {
        let row: Option<TeamRow> = sqlx::query_as(
            r#"UPDATE teams SET
                team_name = COALESCE($2, team_name),
                institution = COALESCE($3, institution),
                lead_name = COALESCE($4, lead_name),
                lead_email = COALESCE($5, lead_email),
                lead_phone = COALESCE($6, lead_phone),
                lead_role = COALESCE($7, lead_role),
                status = COALESCE($8, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(id)
        .bind(patch.team_name)
        .bind(patch.institution)
        .bind(patch.lead_name)
        .bind(patch.lead_email)
        .bind(patch.lead_phone)
        .bind(patch.lead_role)
        .bind(patch.status.map(String::from))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Team::from))
    }

    async fn set_team_status(&self, id: Uuid, status: TeamStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE teams SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn team_stats(&self) -> StoreResult<TeamStats> {
        let (teams, paid_teams, pending_teams): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT COUNT(*)::bigint,
                COUNT(*) FILTER (WHERE status = 'PAID')::bigint,
                COUNT(*) FILTER (WHERE status = 'PENDING')::bigint
            FROM teams"#,
        )
        .fetch_one(&self.pool)
        .await?;
        let volunteers: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM volunteers")
            .fetch_one(&self.pool)
            .await?;

        Ok(TeamStats {
            teams,
            paid_teams,
            pending_teams,
            volunteers,
        })
    }

    async fn create_payment(&self, payment: NewPayment) -> StoreResult<Payment> {
        let row: PaymentRow = sqlx::query_as(
            r#"INSERT INTO payments (id, team_id, amount, currency, provider, provider_ref, reference, status, raw_payload, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'INITIATED', $8, NOW(), NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(payment.team_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(&payment.provider_ref)
        .bind(&payment.reference)
        .bind(&payment.raw_payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "payment"))?;
        row.try_into()
    }

    async fn find_payment(&self, provider: &str, key: &str) -> StoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"SELECT * FROM payments
            WHERE provider = $1 AND (provider_ref = $2 OR reference = $2)
            ORDER BY (provider_ref = $2) DESC, created_at DESC
            LIMIT 1"#,
        )
        .bind(provider)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn latest_payment(&self, team_id: Uuid) -> StoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            "SELECT * FROM payments WHERE team_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
        raw_payload: &Value,
    ) -> StoreResult<Option<Payment>> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"UPDATE payments SET status = $2, raw_payload = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'INITIATED'
            RETURNING *"#,
        )
        .bind(id)
        .bind(to.as_str())
        .bind(raw_payload)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn record_payment_payload(&self, id: Uuid, raw_payload: &Value) -> StoreResult<()> {
        sqlx::query("UPDATE payments SET raw_payload = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(raw_payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn paid_payments_for_pending_teams(&self) -> StoreResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"SELECT p.* FROM payments p
            JOIN teams t ON t.id = p.team_id
            WHERE p.status = 'SUCCESS' AND t.status = 'PENDING'
                AND p.updated_at >= t.updated_at
            ORDER BY p.updated_at"#,
        )
        .fetch_all(&self.pool)
        .await?;
        payments(rows)
    }

    async fn create_volunteer(&self, volunteer: NewVolunteer) -> StoreResult<Volunteer> {
        let row: VolunteerRow = sqlx::query_as(
            r#"INSERT INTO volunteers (id, name, email, phone, ref_code, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&volunteer.name)
        .bind(&volunteer.email)
        .bind(&volunteer.phone)
        .bind(&volunteer.ref_code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "volunteer"))?;
        Ok(row.into())
    }

    async fn find_volunteer_by_ref(&self, ref_code: &str) -> StoreResult<Option<Volunteer>> {
        let row: Option<VolunteerRow> =
            sqlx::query_as("SELECT * FROM volunteers WHERE ref_code = $1")
                .bind(ref_code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Volunteer::from))
    }

    async fn list_volunteers(&self) -> StoreResult<Vec<VolunteerStats>> {
        let rows: Vec<VolunteerStatsRow> = sqlx::query_as(
            r#"SELECT v.id, v.name, v.email, v.phone, v.ref_code, v.created_at,
                COUNT(t.id)::bigint AS teams_count,
                COUNT(paid.team_id)::bigint AS paid_teams_count
            FROM volunteers v
            LEFT JOIN teams t ON t.volunteer_id = v.id
            LEFT JOIN (SELECT DISTINCT team_id FROM payments WHERE status = 'SUCCESS') paid
                ON paid.team_id = t.id
            GROUP BY v.id
            ORDER BY v.created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| VolunteerStats {
                volunteer: r.volunteer.into(),
                teams_count: r.teams_count,
                paid_teams_count: r.paid_teams_count,
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
