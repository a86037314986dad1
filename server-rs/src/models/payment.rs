use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Initiated,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Initiated)
    }

    /// Parses a stored status column.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIATED" => Some(PaymentStatus::Initiated),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to collect the registration fee for a team.
///
/// `(provider, provider_ref)` is unique and is the primary reconciliation
/// key. `reference` is the locally generated reference sent to the
/// provider; it is unique as well and acts as a secondary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub team_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub provider: String,
    pub provider_ref: String,
    pub reference: String,
    pub status: PaymentStatus,
    pub raw_payload: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub team_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub provider: String,
    pub provider_ref: String,
    pub reference: String,
    pub raw_payload: Value,
}
