use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camihn_registration::cache::Cache;
use camihn_registration::config::{Config, StoreBackend};
use camihn_registration::services::fapshi::FapshiClient;
use camihn_registration::services::repair;
use camihn_registration::store::{MemoryStore, PgStore, Store};
use camihn_registration::{build_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Postgres => Arc::new(PgStore::new(db::create_pool(&config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let cache = match Cache::connect(&config.redis).await {
        Ok(cache) => cache,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable; running without cache");
            None
        }
    };

    let gateway = Arc::new(FapshiClient::new(&config.fapshi)?);
    if config.fapshi.api_user.is_none() || config.fapshi.api_key.is_none() {
        tracing::warn!("Fapshi credentials missing; payment initiation will fail");
    }
    if config.fapshi.webhook_secret.is_none() {
        tracing::warn!("FAPSHI_WEBHOOK_SECRET not set; webhook signatures are not checked");
    }

    if config.repair.interval_secs > 0 {
        tokio::spawn(repair::run(
            store.clone(),
            Duration::from_secs(config.repair.interval_secs),
        ));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, store, gateway, cache);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "CAMIHN registration API listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
