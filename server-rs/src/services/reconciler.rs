//! Webhook reconciliation: matches an inbound provider notification to the
//! payment it concerns and applies at most one state transition.
//!
//! Payments move `INITIATED -> SUCCESS | FAILED` exactly once. A verdict
//! that disagrees with an already terminal payment is recorded for audit
//! but never changes its status. Team `PENDING -> PAID` is written only
//! after the payment write has succeeded.

use std::sync::Arc;

use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::{FapshiConfig, SignatureEncoding};
use crate::models::{Payment, PaymentStatus, TeamStatus};
use crate::store::{Store, StoreError};

type HmacSha256 = Hmac<Sha256>;

/// Correlation fields in priority order. Each group lists the spellings the
/// provider has used for the same field.
const CORRELATION_FIELDS: &[&[&str]] = &[
    &["reference", "ref"],
    &["externalId", "external_id"],
    &["transId", "trans_id", "transactionId", "transaction_id"],
];

const STATUS_FIELDS: &[&str] = &["status", "transactionStatus"];

#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub provider: String,
    pub secret: Option<String>,
    pub encoding: SignatureEncoding,
}

impl From<&FapshiConfig> for WebhookSettings {
    fn from(c: &FapshiConfig) -> Self {
        Self {
            provider: c.provider_tag.clone(),
            secret: c.webhook_secret.clone(),
            encoding: c.signature_encoding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("signature header is not valid {0}")]
    Malformed(&'static str),
    #[error("signature does not match body")]
    Mismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Signature check failed; payload ignored.
    Rejected(SignatureError),
    /// Body was not JSON.
    Malformed,
    /// No correlation field carried a value.
    NoCorrelationKey,
    /// No payment matched any candidate key.
    Unmatched { candidates: Vec<String> },
    /// An INITIATED payment reached a terminal state.
    Applied {
        payment_id: Uuid,
        team_id: Uuid,
        status: PaymentStatus,
        team_paid: bool,
    },
    /// Redelivery of the verdict already stored.
    Replayed {
        payment_id: Uuid,
        team_id: Uuid,
        status: PaymentStatus,
        team_paid: bool,
    },
    /// Verdict disagrees with the stored terminal status, which is kept.
    Conflict {
        payment_id: Uuid,
        stored: PaymentStatus,
        reported: PaymentStatus,
    },
}

impl ReconcileOutcome {
    pub fn team_marked_paid(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Applied { team_paid: true, .. }
                | ReconcileOutcome::Replayed { team_paid: true, .. }
        )
    }
}

/// Maps a provider status string to a terminal payment status.
///
/// Anything equal to or starting with `SUCCESS`, in any case, is a success;
/// every other value, including a missing one, is a failure.
pub fn normalize_status(status: Option<&str>) -> PaymentStatus {
    match status {
        Some(s) if s.trim().to_ascii_uppercase().starts_with("SUCCESS") => PaymentStatus::Success,
        _ => PaymentStatus::Failed,
    }
}

fn field_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_field(payload: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| payload.get(*name).and_then(field_str))
}

/// Non-empty correlation keys in priority order, one per field, without
/// duplicates.
pub fn correlation_candidates(payload: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(CORRELATION_FIELDS.len());
    for names in CORRELATION_FIELDS {
        if let Some(value) = first_field(payload, names) {
            if !out.contains(&value) {
                out.push(value);
            }
        }
    }
    out
}

/// Checks an HMAC-SHA256 of the raw body against the signature header.
/// A `sha256=` prefix on the header value is accepted.
pub fn verify_signature(
    secret: &str,
    encoding: SignatureEncoding,
    body: &[u8],
    header: &str,
) -> Result<(), SignatureError> {
    let header = header.trim();
    let header = header.strip_prefix("sha256=").unwrap_or(header);
    if header.is_empty() {
        return Err(SignatureError::Missing);
    }

    let expected = match encoding {
        SignatureEncoding::Hex => {
            hex::decode(header).map_err(|_| SignatureError::Malformed("hex"))?
        }
        SignatureEncoding::Base64 => base64::engine::general_purpose::STANDARD
            .decode(header)
            .map_err(|_| SignatureError::Malformed("base64"))?,
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Malformed("key"))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    settings: WebhookSettings,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, settings: WebhookSettings) -> Self {
        Self { store, settings }
    }

    pub async fn reconcile(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match &self.settings.secret {
            Some(secret) => {
                if let Err(e) =
                    verify_signature(secret, self.settings.encoding, raw_body, signature.unwrap_or(""))
                {
                    tracing::warn!(error = %e, "Webhook rejected: signature verification failed");
                    return Ok(ReconcileOutcome::Rejected(e));
                }
            }
            None => tracing::warn!(
                provider = %self.settings.provider,
                "Webhook secret not configured; processing unauthenticated notification"
            ),
        }

        let payload: Value = match serde_json::from_slice(raw_body) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, body = %String::from_utf8_lossy(raw_body), "Webhook body is not valid JSON");
                return Ok(ReconcileOutcome::Malformed);
            }
        };

        let candidates = correlation_candidates(&payload);
        if candidates.is_empty() {
            tracing::info!("Webhook carried no correlation key; nothing to reconcile");
            return Ok(ReconcileOutcome::NoCorrelationKey);
        }

        let Some(payment) = self.resolve(&candidates).await? else {
            tracing::error!(
                provider = %self.settings.provider,
                candidates = ?candidates,
                "Reconciliation miss: no payment matches webhook; manual follow-up required"
            );
            return Ok(ReconcileOutcome::Unmatched { candidates });
        };

        let status_raw = first_field(&payload, STATUS_FIELDS);
        let verdict = normalize_status(status_raw.as_deref());
        tracing::info!(
            payment_id = %payment.id,
            provider_ref = %payment.provider_ref,
            status = ?status_raw,
            verdict = %verdict,
            "Webhook matched payment"
        );

        self.apply(payment, verdict, &payload).await
    }

    /// Tries each candidate in turn; at most one store round-trip per field.
    async fn resolve(&self, candidates: &[String]) -> Result<Option<Payment>, ReconcileError> {
        for key in candidates {
            if let Some(p) = self.store.find_payment(&self.settings.provider, key).await? {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    async fn apply(
        &self,
        payment: Payment,
        verdict: PaymentStatus,
        payload: &Value,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut current = payment;

        if !current.status.is_terminal() {
            if let Some(updated) = self
                .store
                .transition_payment(current.id, verdict, payload)
                .await?
            {
                tracing::info!(
                    payment_id = %updated.id,
                    team_id = %updated.team_id,
                    status = %updated.status,
                    "Payment transitioned"
                );
                let team_paid = self.settle_team(&updated).await?;
                return Ok(ReconcileOutcome::Applied {
                    payment_id: updated.id,
                    team_id: updated.team_id,
                    status: updated.status,
                    team_paid,
                });
            }

            // A concurrent delivery won the transition; judge against its result.
            match self
                .store
                .find_payment(&current.provider, &current.provider_ref)
                .await?
            {
                Some(fresh) => current = fresh,
                None => return Err(StoreError::Unavailable(format!(
                    "payment {} vanished during reconciliation",
                    current.id
                ))
                .into()),
            }
        }

        self.store.record_payment_payload(current.id, payload).await?;

        if current.status == verdict {
            let team_paid = self.settle_team(&current).await?;
            tracing::info!(
                payment_id = %current.id,
                status = %current.status,
                "Duplicate webhook for terminal payment"
            );
            return Ok(ReconcileOutcome::Replayed {
                payment_id: current.id,
                team_id: current.team_id,
                status: current.status,
                team_paid,
            });
        }

        if verdict == PaymentStatus::Success {
            tracing::error!(
                payment_id = %current.id,
                team_id = %current.team_id,
                stored = %current.status,
                reported = %verdict,
                "Provider reports success for a failed payment; status kept, manual review required"
            );
        } else {
            tracing::warn!(
                payment_id = %current.id,
                stored = %current.status,
                reported = %verdict,
                "Conflicting webhook verdict ignored"
            );
        }
        Ok(ReconcileOutcome::Conflict {
            payment_id: current.id,
            stored: current.status,
            reported: verdict,
        })
    }

    async fn settle_team(&self, payment: &Payment) -> Result<bool, ReconcileError> {
        if payment.status != PaymentStatus::Success {
            return Ok(false);
        }
        match self
            .store
            .set_team_status(payment.team_id, TeamStatus::Paid)
            .await
        {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::error!(
                    payment_id = %payment.id,
                    team_id = %payment.team_id,
                    "Payment succeeded but its team does not exist"
                );
                Ok(false)
            }
            Err(e) => {
                tracing::error!(
                    payment_id = %payment.id,
                    team_id = %payment.team_id,
                    error = %e,
                    "Payment is SUCCESS but team could not be marked PAID; left for repair"
                );
                Err(e.into())
            }
        }
    }
}
