pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod stores;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::stores::postgres::{PgAttemptStore, PgPatternCatalog, PgQuestionBank};
use crate::stores::Stores;

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap().await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Prepdeck attempt engine listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

pub async fn run_watchdog() -> anyhow::Result<()> {
    let state = bootstrap().await?;

    tracing::info!(
        tick_interval_ms = state.settings().watchdog().tick_interval_ms,
        "Prepdeck expiry watchdog running"
    );

    tasks::scheduler::run(state).await
}

async fn bootstrap() -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let stores = Stores {
        attempts: Arc::new(PgAttemptStore::new(db_pool.clone())),
        catalog: Arc::new(PgPatternCatalog::new(db_pool.clone())),
        bank: Arc::new(PgQuestionBank::new(db_pool)),
    };

    Ok(AppState::new(settings, stores))
}
