#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::{Request, Response};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use camihn_registration::config::Config;
use camihn_registration::models::{
    Member, NewPayment, NewTeam, NewVolunteer, Payment, PaymentStatus, RegisterTeamRequest, Team,
    TeamDetail, TeamPatch, TeamStats, TeamStatus, Volunteer, VolunteerStats,
};
use camihn_registration::services::fapshi::{
    normalize_response, GatewayError, GatewayResult, InitiatePayment, PaymentGateway,
};
use camihn_registration::store::{MemoryStore, Store, StoreError, StoreResult};
use camihn_registration::{build_router, AppState};

pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub enum Scripted {
    Respond(Value),
    Reject(u16),
}

/// Gateway that replays scripted responses in order. When the script runs
/// out it answers with a fresh payment link.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<InitiatePayment>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, step: Scripted) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InitiatePayment> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> &str {
        "FAPSHI"
    }

    async fn initiate(&self, request: &InitiatePayment) -> Result<GatewayResult, GatewayError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());

        let step = self.script.lock().unwrap().pop_front();
        let raw = match step {
            Some(Scripted::Respond(raw)) => raw,
            Some(Scripted::Reject(status)) => {
                return Err(GatewayError::Rejected {
                    status,
                    body: r#"{"message":"rejected"}"#.into(),
                })
            }
            None => json!({
                "message": "Request successful",
                "link": format!("https://checkout.fapshi.com/link/{n}"),
                "transId": format!("tx-{n}"),
            }),
        };
        let body = raw.to_string();
        normalize_response(raw).ok_or(GatewayError::MissingRedirect { body })
    }
}

/// Wraps a [`MemoryStore`] and fails selected writes on demand.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_create_team: AtomicBool,
    fail_team_status: AtomicBool,
}

impl FaultyStore {
    pub fn fail_create_team(&self, on: bool) {
        self.fail_create_team.store(on, Ordering::SeqCst);
    }

    pub fn fail_team_status(&self, on: bool) {
        self.fail_team_status.store(on, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{what} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn create_team(&self, team: NewTeam) -> StoreResult<Team> {
        Self::check(&self.fail_create_team, "create_team")?;
        self.inner.create_team(team).await
    }
    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        self.inner.get_team(id).await
    }
    async fn team_members(&self, team_id: Uuid) -> StoreResult<Vec<Member>> {
        self.inner.team_members(team_id).await
    }
    async fn list_team_details(&self) -> StoreResult<Vec<TeamDetail>> {
        self.inner.list_team_details().await
    }
    async fn update_team(&self, id: Uuid, patch: TeamPatch) -> StoreResult<Option<Team>> {
        self.inner.update_team(id, patch).await
    }
    async fn set_team_status(&self, id: Uuid, status: TeamStatus) -> StoreResult<bool> {
        Self::check(&self.fail_team_status, "set_team_status")?;
        self.inner.set_team_status(id, status).await
    }
    async fn team_stats(&self) -> StoreResult<TeamStats> {
        self.inner.team_stats().await
    }
    async fn create_payment(&self, payment: NewPayment) -> StoreResult<Payment> {
        self.inner.create_payment(payment).await
    }
    async fn find_payment(&self, provider: &str, key: &str) -> StoreResult<Option<Payment>> {
        self.inner.find_payment(provider, key).await
    }
    async fn latest_payment(&self, team_id: Uuid) -> StoreResult<Option<Payment>> {
        self.inner.latest_payment(team_id).await
    }
    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
        raw_payload: &Value,
    ) -> StoreResult<Option<Payment>> {
        self.inner.transition_payment(id, to, raw_payload).await
    }
    async fn record_payment_payload(&self, id: Uuid, raw_payload: &Value) -> StoreResult<()> {
        self.inner.record_payment_payload(id, raw_payload).await
    }
    async fn paid_payments_for_pending_teams(&self) -> StoreResult<Vec<Payment>> {
        self.inner.paid_payments_for_pending_teams().await
    }
    async fn create_volunteer(&self, volunteer: NewVolunteer) -> StoreResult<Volunteer> {
        self.inner.create_volunteer(volunteer).await
    }
    async fn find_volunteer_by_ref(&self, ref_code: &str) -> StoreResult<Option<Volunteer>> {
        self.inner.find_volunteer_by_ref(ref_code).await
    }
    async fn list_volunteers(&self) -> StoreResult<Vec<VolunteerStats>> {
        self.inner.list_volunteers().await
    }
    async fn ping(&self) -> bool {
        self.inner.ping().await
    }
}

pub struct TestApp {
    /// Shares tables with `faults`; reads here see every write.
    pub store: MemoryStore,
    pub faults: Arc<FaultyStore>,
    pub gateway: Arc<FakeGateway>,
    pub state: AppState,
    pub router: Router,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.admin.token = Some(ADMIN_TOKEN.into());
    config.admin.password = Some(ADMIN_PASSWORD.into());
    config
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(test_config())
}

pub fn spawn_app_with(config: Config) -> TestApp {
    let store = MemoryStore::new();
    let faults = Arc::new(FaultyStore {
        inner: store.clone(),
        ..FaultyStore::default()
    });
    let gateway = FakeGateway::new();
    let state = AppState::new(config, faults.clone(), gateway.clone(), None);
    let router = build_router(state.clone());
    TestApp {
        store,
        faults,
        gateway,
        state,
        router,
    }
}

pub fn alpha_request() -> Value {
    json!({
        "teamName": "Alpha",
        "institution": "University of Buea",
        "lead": {
            "name": "Jane",
            "email": "jane@x.com",
            "phone": "+237600000000",
            "role": "Captain"
        },
        "members": [{"name": "Bob", "email": "bob@x.com"}]
    })
}

pub fn alpha() -> RegisterTeamRequest {
    serde_json::from_value(alpha_request()).unwrap()
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> (u16, Value) {
        let req = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        read(self.send(req).await).await
    }

    pub async fn get(&self, uri: &str) -> (u16, Value) {
        let req = Request::get(uri).body(Body::empty()).unwrap();
        read(self.send(req).await).await
    }

    pub async fn admin(&self, method: &str, uri: &str, body: Option<&Value>) -> (u16, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {ADMIN_TOKEN}"));
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        read(self.send(req).await).await
    }

    pub async fn webhook(&self, body: &Value) -> (u16, Value) {
        self.post_json("/api/webhooks/fapshi", body).await
    }
}

pub async fn read(resp: Response<Body>) -> (u16, Value) {
    let status = resp.status().as_u16();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
