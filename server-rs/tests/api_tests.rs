mod common;

use axum::body::Body;
use http::Request;
use serde_json::json;

use camihn_registration::models::{PaymentStatus, TeamStatus};
use camihn_registration::store::Store;
use common::{alpha_request, read, spawn_app, spawn_app_with, test_config, ADMIN_PASSWORD, ADMIN_TOKEN};

#[tokio::test]
async fn register_then_webhook_end_to_end() {
    let app = spawn_app();

    let (status, body) = app
        .post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["payment"]["amount"], 1000);
    assert_eq!(body["payment"]["currency"], "XAF");
    assert_eq!(body["payment"]["provider"], "FAPSHI");
    assert_eq!(
        body["payment"]["checkoutUrl"],
        "https://checkout.fapshi.com/link/1"
    );
    let team_id = body["teamId"].as_str().unwrap().to_string();
    let reference = app.store.payments().await[0].reference.clone();

    let (status, body) = app
        .webhook(&json!({"externalId": reference, "status": "SUCCESSFUL"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"received": true}));

    let (status, receipt) = app.get(&format!("/api/hackathon/team/{team_id}")).await;
    assert_eq!(status, 200);
    assert_eq!(receipt["team"]["status"], "PAID");
    assert_eq!(receipt["team"]["teamName"], "Alpha");
    assert_eq!(receipt["members"][0]["name"], "Bob");
    assert_eq!(receipt["payment"]["status"], "SUCCESS");
}

#[tokio::test]
async fn malformed_registration_is_400() {
    let app = spawn_app();

    let req = Request::post("/api/hackathon/register-team")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = read(app.send(req).await).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let mut invalid = alpha_request();
    invalid["members"] = json!([{"name": "", "email": ""}]);
    let (status, _) = app.post_json("/api/hackathon/register-team", &invalid).await;
    assert_eq!(status, 400);
    assert!(app.store.teams().await.is_empty());
}

#[tokio::test]
async fn gateway_failure_is_502_and_team_survives() {
    let app = spawn_app();
    app.gateway.push(common::Scripted::Reject(500));

    let (status, body) = app
        .post_json("/api/hackathon/register-team", &alpha_request())
        .await;

    assert_eq!(status, 502);
    assert_eq!(body["error"], "Unable to initiate payment");
    assert_eq!(app.store.teams().await.len(), 1);
    assert!(app.store.payments().await.is_empty());
}

#[tokio::test]
async fn webhook_parse_failure_and_unknown_reference_are_acknowledged() {
    let app = spawn_app();

    let req = Request::post("/api/webhooks/fapshi")
        .body(Body::from("garbage"))
        .unwrap();
    let (status, _) = read(app.send(req).await).await;
    assert_eq!(status, 200);

    let (status, body) = app
        .webhook(&json!({"externalId": "CAMIHN-missing-1", "status": "SUCCESS"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn webhook_store_failure_asks_for_redelivery() {
    let app = spawn_app();
    app.post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    let reference = app.store.payments().await[0].reference.clone();
    app.faults.fail_team_status(true);

    let (status, body) = app
        .webhook(&json!({"externalId": reference, "status": "SUCCESS"}))
        .await;

    assert_eq!(status, 500);
    assert!(body["error"].is_string());
    assert_eq!(app.store.payments().await[0].status, PaymentStatus::Success);
    assert_eq!(app.store.teams().await[0].status, TeamStatus::Pending);
}

#[tokio::test]
async fn bad_signature_is_acknowledged_but_ignored() {
    let mut config = test_config();
    config.fapshi.webhook_secret = Some("whsec".into());
    let app = spawn_app_with(config);
    app.post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    let reference = app.store.payments().await[0].reference.clone();

    let req = Request::post("/api/webhooks/fapshi")
        .header("x-fapshi-signature", "deadbeef")
        .body(Body::from(
            json!({"externalId": reference, "status": "SUCCESS"}).to_string(),
        ))
        .unwrap();
    let (status, _) = read(app.send(req).await).await;

    assert_eq!(status, 200);
    assert_eq!(app.store.payments().await[0].status, PaymentStatus::Initiated);
}

#[tokio::test]
async fn retry_endpoint_and_receipt_errors() {
    let app = spawn_app();
    let (_, body) = app
        .post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    let team_id = body["teamId"].as_str().unwrap().to_string();

    let (status, retry) = app
        .post_json(&format!("/api/hackathon/team/{team_id}/payment"), &json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(retry["checkoutUrl"], body["payment"]["checkoutUrl"]);
    assert_eq!(app.gateway.calls(), 1);

    let unknown = uuid::Uuid::new_v4();
    let (status, _) = app.get(&format!("/api/hackathon/team/{unknown}")).await;
    assert_eq!(status, 404);
    let (status, _) = app
        .post_json(&format!("/api/hackathon/team/{unknown}/payment"), &json!({}))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn registration_is_rate_limited() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    let app = spawn_app_with(config);

    for _ in 0..2 {
        let (status, _) = app
            .post_json("/api/hackathon/register-team", &alpha_request())
            .await;
        assert_eq!(status, 200);
    }
    let (status, body) = app
        .post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "Too many requests");
}

#[tokio::test]
async fn admin_routes_require_bearer_token() {
    let app = spawn_app();

    let (status, _) = app.get("/api/hackathon/admin/teams").await;
    assert_eq!(status, 401);

    let req = Request::get("/api/hackathon/admin/teams")
        .header("authorization", "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = read(app.send(req).await).await;
    assert_eq!(status, 401);

    let (status, body) = app.admin("GET", "/api/hackathon/admin/teams", None).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn admin_without_configured_token_is_500() {
    let mut config = test_config();
    config.admin.token = None;
    let app = spawn_app_with(config);

    let (status, _) = app.admin("GET", "/api/hackathon/admin/stats", None).await;
    assert_eq!(status, 500);
    let (status, body) = app
        .post_json("/api/hackathon/admin/login", &json!({"password": ADMIN_PASSWORD}))
        .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Admin not configured");
}

#[tokio::test]
async fn admin_login_exchanges_password_for_token() {
    let app = spawn_app();

    let (status, body) = app
        .post_json("/api/hackathon/admin/login", &json!({"password": ADMIN_PASSWORD}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["token"], ADMIN_TOKEN);

    let (status, body) = app
        .post_json("/api/hackathon/admin/login", &json!({"password": "guess"}))
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn admin_lists_and_patches_teams() {
    let app = spawn_app();
    let (_, reg) = app
        .post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    let team_id = reg["teamId"].as_str().unwrap().to_string();

    let (status, teams) = app.admin("GET", "/api/hackathon/admin/teams", None).await;
    assert_eq!(status, 200);
    assert_eq!(teams[0]["id"], team_id.as_str());
    assert_eq!(teams[0]["leadName"], "Jane");
    assert_eq!(teams[0]["members"].as_array().unwrap().len(), 1);
    assert_eq!(teams[0]["payment"]["status"], "INITIATED");

    let (status, team) = app
        .admin(
            "PATCH",
            &format!("/api/hackathon/admin/team/{team_id}"),
            Some(&json!({"institution": "ICT University", "status": "paid"})),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(team["institution"], "ICT University");
    assert_eq!(team["status"], "PAID");
    assert_eq!(team["teamName"], "Alpha");

    let stored = app
        .store
        .get_team(team_id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TeamStatus::Paid);

    let (status, _) = app
        .admin(
            "PATCH",
            &format!("/api/hackathon/admin/team/{}", uuid::Uuid::new_v4()),
            Some(&json!({"teamName": "Ghost"})),
        )
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn volunteers_get_referral_links_and_counts() {
    let app = spawn_app();

    let (status, _) = app
        .admin(
            "POST",
            "/api/hackathon/admin/volunteers",
            Some(&json!({"name": "Vic", "email": ""})),
        )
        .await;
    assert_eq!(status, 400);

    let (status, volunteer) = app
        .admin(
            "POST",
            "/api/hackathon/admin/volunteers",
            Some(&json!({"name": "Vic", "email": "vic@x.com", "phone": "+237611111111"})),
        )
        .await;
    assert_eq!(status, 200);
    let ref_code = volunteer["refCode"].as_str().unwrap().to_string();
    assert_eq!(ref_code.len(), 16);
    assert!(ref_code.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(
        volunteer["registrationLink"],
        format!("http://localhost:3000/hackathon/register?ref={ref_code}")
    );

    let mut with_ref = alpha_request();
    with_ref["refCode"] = json!(ref_code);
    app.post_json("/api/hackathon/register-team", &with_ref).await;
    app.post_json("/api/hackathon/register-team", &with_ref).await;
    let reference = app.store.payments().await[0].reference.clone();
    app.webhook(&json!({"externalId": reference, "status": "SUCCESS"}))
        .await;

    let (status, list) = app
        .admin("GET", "/api/hackathon/admin/volunteers", None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(list[0]["refCode"], ref_code.as_str());
    assert_eq!(list[0]["teamsCount"], 2);
    assert_eq!(list[0]["paidTeamsCount"], 1);
}

#[tokio::test]
async fn stats_reflect_payments() {
    let app = spawn_app();
    app.post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    app.post_json("/api/hackathon/register-team", &alpha_request())
        .await;
    let reference = app.store.payments().await[0].reference.clone();
    app.webhook(&json!({"externalId": reference, "status": "SUCCESS"}))
        .await;

    let (status, stats) = app.admin("GET", "/api/hackathon/admin/stats", None).await;
    assert_eq!(status, 200);
    assert_eq!(
        stats,
        json!({"teams": 2, "paidTeams": 1, "pendingTeams": 1, "volunteers": 0})
    );
}

#[tokio::test]
async fn health_reports_store_and_missing_cache() {
    let app = spawn_app();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
    assert!(body["redis"].is_null());
}
