mod api;
mod audit;
mod auth;
mod db;
mod issuance;
mod ledger;
mod metrics;
mod qr;
mod revocation;
mod state;
#[cfg(test)]
mod testkit;
mod verification;

use crate::db::init_db;
use crate::state::AppState;
use anyhow::Result;
use medevents_common::AppConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env()?;
    let db = init_db(&config.database_url).await?;
    let state = AppState::new(db, &config);

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("medevents api listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    Ok(())
}
