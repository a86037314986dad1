use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::config::RegistrationConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    LeadInput, MemberInput, NewPayment, NewTeam, PaymentStatus, RegisterTeamRequest, Team,
    TeamStatus,
};
use crate::services::fapshi::{
    normalize_response, GatewayResult, InitiatePayment, PayerContact, PaymentGateway,
};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub fee_amount: i64,
    pub currency: String,
    pub reference_prefix: String,
    pub success_url: String,
    pub cancel_url: String,
    pub description: String,
}

impl From<&RegistrationConfig> for RegistrationSettings {
    fn from(c: &RegistrationConfig) -> Self {
        Self {
            fee_amount: c.fee_amount,
            currency: c.currency.clone(),
            reference_prefix: c.reference_prefix.clone(),
            success_url: c.success_url.clone(),
            cancel_url: c.cancel_url.clone(),
            description: c.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiation {
    pub amount: i64,
    pub currency: String,
    pub provider: String,
    #[serde(rename = "checkoutUrl")]
    pub checkout_url: String,
    #[serde(rename = "providerTransactionId")]
    pub provider_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    #[serde(rename = "teamId")]
    pub team_id: Uuid,
    pub payment: PaymentInitiation,
}

fn clean(s: &str) -> String {
    s.trim().to_string()
}

/// Checks required fields and drops members without a name or email.
/// Returns the team to persist and the referral code, if any.
pub fn validate(req: RegisterTeamRequest) -> AppResult<(NewTeam, Option<String>)> {
    let lead = LeadInput {
        name: clean(&req.lead.name),
        email: clean(&req.lead.email),
        phone: clean(&req.lead.phone),
        role: clean(&req.lead.role),
    };
    let team_name = clean(&req.team_name);

    if team_name.is_empty()
        || lead.name.is_empty()
        || lead.email.is_empty()
        || lead.phone.is_empty()
        || lead.role.is_empty()
    {
        return Err(AppError::BadRequest(
            "Missing required team or lead fields".into(),
        ));
    }

    let members: Vec<MemberInput> = req
        .members
        .into_iter()
        .map(|m| MemberInput {
            name: clean(&m.name),
            email: clean(&m.email),
            role: m.role.map(|r| clean(&r)).filter(|r| !r.is_empty()),
        })
        .filter(|m| !m.name.is_empty() && !m.email.is_empty())
        .collect();

    if members.is_empty() {
        return Err(AppError::BadRequest(
            "At least one teammate is required".into(),
        ));
    }

    let team = NewTeam {
        team_name,
        institution: req.institution.map(|i| clean(&i)).filter(|i| !i.is_empty()),
        lead,
        members,
        volunteer_id: None,
    };
    let ref_code = req.ref_code.map(|r| clean(&r)).filter(|r| !r.is_empty());
    Ok((team, ref_code))
}

/// Drives team registration and payment initiation.
pub struct Registrar {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    settings: RegistrationSettings,
    last_stamp: AtomicI64,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub async fn register(&self, req: RegisterTeamRequest) -> AppResult<Registration> {
        let (mut new_team, ref_code) = validate(req)?;

        if let Some(code) = ref_code {
            match self.store.find_volunteer_by_ref(&code).await? {
                Some(v) => new_team.volunteer_id = Some(v.id),
                None => tracing::warn!(ref_code = %code, "Unknown referral code ignored"),
            }
        }

        let team = self.store.create_team(new_team).await?;
        tracing::info!(team_id = %team.id, team_name = %team.team_name, "Team registered");

        let payment = self.initiate_for(&team).await?;
        Ok(Registration {
            team_id: team.id,
            payment,
        })
    }

    /// Re-offers payment for an existing team. An outstanding INITIATED
    /// payment is handed back as-is; a new attempt is only started when
    /// there is none or the last one failed.
    pub async fn retry_payment(&self, team_id: Uuid) -> AppResult<PaymentInitiation> {
        let team = self
            .store
            .get_team(team_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Team not found".into()))?;

        if team.status == TeamStatus::Paid {
            return Err(AppError::Conflict("Team has already paid".into()));
        }

        match self.store.latest_payment(team_id).await? {
            Some(p) if p.status == PaymentStatus::Success => {
                return Err(AppError::Conflict("Team has already paid".into()));
            }
            Some(p) if p.status == PaymentStatus::Initiated => {
                if let Some(prior) = normalize_response(p.raw_payload.clone()) {
                    tracing::info!(team_id = %team_id, payment_id = %p.id, "Reusing outstanding payment");
                    return Ok(PaymentInitiation {
                        amount: p.amount,
                        currency: p.currency,
                        provider: p.provider,
                        checkout_url: prior.redirect.url().to_string(),
                        provider_transaction_id: prior.provider_transaction_id,
                    });
                }
            }
            _ => {}
        }

        self.initiate_for(&team).await
    }

    async fn initiate_for(&self, team: &Team) -> AppResult<PaymentInitiation> {
        let reference = self.next_reference(team.id);
        let request = InitiatePayment {
            amount: self.settings.fee_amount,
            currency: self.settings.currency.clone(),
            team_id: team.id,
            reference: reference.clone(),
            description: self.settings.description.clone(),
            contact: PayerContact {
                name: team.lead_name.clone(),
                email: team.lead_email.clone(),
                phone: team.lead_phone.clone(),
            },
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
        };

        let result: GatewayResult = self.gateway.initiate(&request).await.map_err(|e| {
            tracing::warn!(
                team_id = %team.id,
                reference = %reference,
                "Payment initiation failed; team kept without payment"
            );
            AppError::from(e)
        })?;

        let provider_ref = result
            .provider_transaction_id
            .clone()
            .unwrap_or_else(|| reference.clone());

        let payment = self
            .store
            .create_payment(NewPayment {
                team_id: team.id,
                amount: self.settings.fee_amount,
                currency: self.settings.currency.clone(),
                provider: self.gateway.provider().to_string(),
                provider_ref,
                reference,
                raw_payload: result.raw.clone(),
            })
            .await?;

        tracing::info!(
            team_id = %team.id,
            payment_id = %payment.id,
            provider_ref = %payment.provider_ref,
            "Payment recorded as INITIATED"
        );

        Ok(PaymentInitiation {
            amount: payment.amount,
            currency: payment.currency,
            provider: payment.provider,
            checkout_url: result.redirect.url().to_string(),
            provider_transaction_id: result.provider_transaction_id,
        })
    }

    /// `{PREFIX}-{teamId}-{millis}`, strictly increasing within this process.
    fn next_reference(&self, team_id: Uuid) -> String {
        let now = Utc::now().timestamp_millis();
        let stamp = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .map(|last| now.max(last + 1))
            .unwrap_or(now);
        format!("{}-{}-{}", self.settings.reference_prefix, team_id, stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterTeamRequest {
        serde_json::from_value(serde_json::json!({
            "teamName": " Alpha ",
            "institution": "",
            "lead": {"name": "Jane", "email": "jane@x.com", "phone": "+237600000000", "role": "Captain"},
            "members": [
                {"name": "Bob", "email": "bob@x.com"},
                {"name": "", "email": "ghost@x.com"},
                {"name": "NoMail", "email": "  "}
            ],
            "refCode": "abc"
        }))
        .unwrap()
    }

    #[test]
    fn validate_trims_and_filters_members() {
        let (team, ref_code) = validate(request()).unwrap();
        assert_eq!(team.team_name, "Alpha");
        assert!(team.institution.is_none());
        assert_eq!(team.members.len(), 1);
        assert_eq!(team.members[0].name, "Bob");
        assert_eq!(ref_code.as_deref(), Some("abc"));
    }

    #[test]
    fn validate_rejects_missing_lead_field() {
        let mut req = request();
        req.lead.phone = "   ".into();
        assert!(matches!(validate(req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn validate_rejects_when_no_member_survives() {
        let mut req = request();
        req.members.retain(|m| m.name != "Bob");
        assert!(matches!(validate(req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn missing_sections_are_validation_errors() {
        let req: RegisterTeamRequest = serde_json::from_value(serde_json::json!({
            "teamName": "Alpha"
        }))
        .unwrap();
        assert!(matches!(validate(req), Err(AppError::BadRequest(_))));
    }
}
