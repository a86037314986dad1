use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_mw,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use cache::Cache;
use config::Config;
use middleware::rate_limit::RateLimiter;
use services::fapshi::PaymentGateway;
use services::reconciler::{Reconciler, WebhookSettings};
use services::registration::{Registrar, RegistrationSettings};
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Option<Cache>,
    pub config: Arc<Config>,
    pub registrar: Arc<Registrar>,
    pub reconciler: Arc<Reconciler>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        cache: Option<Cache>,
    ) -> Self {
        let registrar = Registrar::new(
            store.clone(),
            gateway,
            RegistrationSettings::from(&config.registration),
        );
        let reconciler = Reconciler::new(store.clone(), WebhookSettings::from(&config.fapshi));
        let rate_limiter = RateLimiter::new(
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        );
        Self {
            store,
            cache,
            config: Arc::new(config),
            registrar: Arc::new(registrar),
            reconciler: Arc::new(reconciler),
            rate_limiter,
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match HeaderValue::from_str(config.app_base_url.trim_end_matches('/')) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!(app_base_url = %config.app_base_url, "APP_BASE_URL is not a valid origin; CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn build_router(state: AppState) -> Router {
    // --- Public registration (rate limited) ---
    let hackathon_routes = Router::new()
        .route("/register-team", post(routes::registration::register_team))
        .route("/team/:teamId", get(routes::registration::team_receipt))
        .route(
            "/team/:teamId/payment",
            post(routes::registration::retry_payment),
        )
        .route_layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::registration_rate_limit,
        ));

    // --- Admin (bearer token) ---
    let admin_routes = Router::new()
        .route("/teams", get(routes::admin::list_teams))
        .route("/team/:teamId", patch(routes::admin::update_team))
        .route(
            "/volunteers",
            get(routes::admin::list_volunteers).post(routes::admin::create_volunteer),
        )
        .route("/stats", get(routes::admin::stats))
        .route_layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::admin::require_admin,
        ))
        .route("/login", post(routes::admin::login));

    // --- Provider callbacks (raw body, signature checked in the reconciler) ---
    let webhook_routes = Router::new().route("/fapshi", post(routes::webhooks::fapshi_webhook));

    let api = Router::new()
        .nest("/hackathon", hackathon_routes.nest("/admin", admin_routes))
        .nest("/webhooks", webhook_routes);

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}
