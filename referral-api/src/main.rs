use std::sync::Arc;

use referral_api::config::{AppConfig, StorageKind};
use referral_api::store::{MemoryStore, PgStore, ReferralStore};
use referral_api::{build_router, AppState};
use referral_shared::clients::db::create_pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    referral_shared::middleware::init_tracing("referral-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let store: Arc<dyn ReferralStore> = match config.storage {
        StorageKind::Postgres => {
            let pool = create_pool(&config.database_url, config.db_pool_size)?;
            Arc::new(PgStore::new(pool))
        }
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let metrics = referral_shared::middleware::init_metrics()?;

    tracing::info!(
        storage = ?config.storage,
        enforce_code_expiry = config.enforce_code_expiry,
        single_use_codes = config.single_use_codes,
        email_verifier = !config.email_verifier_api_key.is_empty(),
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(config, store).with_metrics(metrics));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "referral-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("referral-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
