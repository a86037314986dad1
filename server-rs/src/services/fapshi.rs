use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::FapshiConfig;

/// Contact details forwarded to the provider for the payer.
#[derive(Debug, Clone)]
pub struct PayerContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct InitiatePayment {
    pub amount: i64,
    pub currency: String,
    pub team_id: Uuid,
    pub reference: String,
    pub description: String,
    pub contact: PayerContact,
    pub success_url: String,
    pub cancel_url: String,
}

/// Where the payer is sent to complete the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectTarget {
    CheckoutUrl(String),
    PaymentLink(String),
}

impl RedirectTarget {
    pub fn url(&self) -> &str {
        match self {
            RedirectTarget::CheckoutUrl(u) | RedirectTarget::PaymentLink(u) => u,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayResult {
    pub redirect: RedirectTarget,
    pub provider_transaction_id: Option<String>,
    pub provider_message: Option<String>,
    /// Provider response body as received, kept for audit.
    pub raw: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} missing")]
    NotConfigured(&'static str),

    #[error("provider rejected request with status {status}")]
    Rejected { status: u16, body: String },

    #[error("provider response carried no redirect target")]
    MissingRedirect { body: String },

    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { body, .. } | GatewayError::MissingRedirect { body } => {
                Some(body)
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Provider tag stored on every payment this gateway creates.
    fn provider(&self) -> &str;

    async fn initiate(&self, request: &InitiatePayment) -> Result<GatewayResult, GatewayError>;
}

const TRANSACTION_ID_FIELDS: &[&str] = &[
    "transId",
    "trans_id",
    "transactionId",
    "transaction_id",
    "reference",
];

/// Non-empty string, or a number rendered as text.
fn text_field(v: &Value, name: &str) -> Option<String> {
    match v.get(name)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Checkout URL first, then payment link.
fn redirect_in(v: &Value) -> Option<RedirectTarget> {
    let url = |name: &str| match v.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };
    url("checkout_url")
        .or_else(|| url("checkoutUrl"))
        .map(RedirectTarget::CheckoutUrl)
        .or_else(|| url("link").map(RedirectTarget::PaymentLink))
}

fn transaction_id_in(v: &Value) -> Option<String> {
    TRANSACTION_ID_FIELDS
        .iter()
        .find_map(|name| text_field(v, name))
}

/// Turns a provider response body into a [`GatewayResult`], or `None` when
/// no non-empty redirect target is present. Fields of unexpected type are
/// skipped rather than failing the whole body.
pub fn normalize_response(raw: Value) -> Option<GatewayResult> {
    let data = raw.get("data").filter(|d| d.is_object());
    let redirect = redirect_in(&raw).or_else(|| data.and_then(redirect_in))?;
    let provider_transaction_id =
        transaction_id_in(&raw).or_else(|| data.and_then(transaction_id_in));
    let provider_message =
        text_field(&raw, "message").or_else(|| data.and_then(|d| text_field(d, "message")));
    Some(GatewayResult {
        redirect,
        provider_transaction_id,
        provider_message,
        raw,
    })
}

/// Thin Fapshi client over raw HTTP calls.
#[derive(Clone)]
pub struct FapshiClient {
    config: FapshiConfig,
    client: reqwest::Client,
}

impl FapshiClient {
    pub fn new(config: &FapshiConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn credentials(&self) -> Result<(&str, &str), GatewayError> {
        let user = self
            .config
            .api_user
            .as_deref()
            .ok_or(GatewayError::NotConfigured("FAPSHI_API_USER"))?;
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("FAPSHI_API_KEY"))?;
        Ok((user, key))
    }
}

fn initiate_body(req: &InitiatePayment) -> Value {
    json!({
        "amount": req.amount,
        "currency": req.currency,
        "reference": req.reference,
        "externalId": req.reference,
        "userId": req.team_id.to_string(),
        "email": req.contact.email,
        "message": req.description,
        "description": req.description,
        "customer": {
            "name": req.contact.name,
            "email": req.contact.email,
            "phone": req.contact.phone,
        },
        "redirectUrl": req.success_url,
        "success_url": req.success_url,
        "cancel_url": req.cancel_url,
    })
}

#[async_trait]
impl PaymentGateway for FapshiClient {
    fn provider(&self) -> &str {
        &self.config.provider_tag
    }

    async fn initiate(&self, request: &InitiatePayment) -> Result<GatewayResult, GatewayError> {
        let (user, key) = self.credentials()?;

        let url = format!("{}/initiate-pay", self.config.api_base_url);
        let resp = self
            .client
            .post(&url)
            .header(self.config.user_header.as_str(), user)
            .header(self.config.key_header.as_str(), key)
            .json(&initiate_body(request))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(_) => return Err(GatewayError::MissingRedirect { body }),
        };

        let result = normalize_response(raw).ok_or(GatewayError::MissingRedirect { body })?;
        tracing::info!(
            reference = %request.reference,
            provider_transaction_id = ?result.provider_transaction_id,
            "Payment initiated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_url_shape() {
        let r = normalize_response(json!({"checkout_url": "https://pay/x", "reference": "R1"}))
            .unwrap();
        assert_eq!(r.redirect, RedirectTarget::CheckoutUrl("https://pay/x".into()));
        assert_eq!(r.provider_transaction_id.as_deref(), Some("R1"));
    }

    #[test]
    fn link_shape_with_trans_id() {
        let r = normalize_response(json!({
            "message": "Request successful",
            "link": "https://checkout.fapshi.com/link/123",
            "transId": "abc123",
            "dateInitiated": "2025-01-01"
        }))
        .unwrap();
        assert_eq!(r.redirect.url(), "https://checkout.fapshi.com/link/123");
        assert_eq!(r.provider_transaction_id.as_deref(), Some("abc123"));
        assert_eq!(r.provider_message.as_deref(), Some("Request successful"));
    }

    #[test]
    fn embedded_shape() {
        let r = normalize_response(json!({
            "message": "ok",
            "data": {"link": "https://l/1", "transId": "t-1"}
        }))
        .unwrap();
        assert_eq!(r.redirect, RedirectTarget::PaymentLink("https://l/1".into()));
        assert_eq!(r.provider_transaction_id.as_deref(), Some("t-1"));
        assert_eq!(r.provider_message.as_deref(), Some("ok"));
    }

    #[test]
    fn no_redirect_is_rejected() {
        assert!(normalize_response(json!({"transId": "t-1", "message": "ok"})).is_none());
        assert!(normalize_response(json!({"link": "  "})).is_none());
        assert!(normalize_response(json!("nope")).is_none());
    }

    #[test]
    fn numeric_transaction_id_is_kept() {
        let r = normalize_response(json!({
            "link": "https://checkout.fapshi.com/link/1",
            "transId": 12345
        }))
        .unwrap();
        assert_eq!(r.redirect.url(), "https://checkout.fapshi.com/link/1");
        assert_eq!(r.provider_transaction_id.as_deref(), Some("12345"));
    }

    #[test]
    fn empty_checkout_url_falls_back_to_link() {
        let r = normalize_response(json!({"checkout_url": "", "link": "https://l/1"})).unwrap();
        assert_eq!(r.redirect, RedirectTarget::PaymentLink("https://l/1".into()));
    }

    #[test]
    fn odd_message_type_does_not_hide_link() {
        let r = normalize_response(json!({
            "link": "https://l/1",
            "message": {"code": 200},
            "transId": "t-9"
        }))
        .unwrap();
        assert_eq!(r.redirect.url(), "https://l/1");
        assert!(r.provider_message.is_none());
        assert_eq!(r.provider_transaction_id.as_deref(), Some("t-9"));
    }

    #[test]
    fn empty_transaction_id_is_dropped() {
        let r = normalize_response(json!({"link": "https://l/1", "transId": ""})).unwrap();
        assert!(r.provider_transaction_id.is_none());
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let config = FapshiConfig {
            provider_tag: "FAPSHI".into(),
            // Unroutable on purpose: the call must never be attempted.
            api_base_url: "http://127.0.0.1:1".into(),
            api_user: Some("user".into()),
            api_key: None,
            user_header: "apiuser".into(),
            key_header: "apikey".into(),
            webhook_secret: None,
            signature_header: "x-fapshi-signature".into(),
            signature_encoding: crate::config::SignatureEncoding::Hex,
            timeout_secs: 1,
        };
        let client = FapshiClient::new(&config).unwrap();
        let req = InitiatePayment {
            amount: 1000,
            currency: "XAF".into(),
            team_id: Uuid::new_v4(),
            reference: "CAMIHN-x-1".into(),
            description: "fee".into(),
            contact: PayerContact {
                name: "Jane".into(),
                email: "jane@x.com".into(),
                phone: "+237".into(),
            },
            success_url: "https://a/s".into(),
            cancel_url: "https://a/c".into(),
        };

        let err = client.initiate(&req).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured("FAPSHI_API_KEY")));
    }
}
