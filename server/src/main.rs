//! LeadForge server binary.

use anyhow::Context;
use leadforge_browser::BrowserEngine;
use leadforge_core::AppConfig;
use leadforge_db::Database;
use leadforge_enrichment::DnsDomainVerifier;
use leadforge_mail::LettreMailer;
use leadforge_server::{maintenance, AppState};
use std::sync::Arc;
use tracing::info;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,leadforge=debug,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting LeadForge v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("failed to load configuration")?;

    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    info!("Database: {}", db_path.display());
    let db = Database::with_max_connections(&db_path, config.database.max_connections).await?;
    db.run_migrations().await?;
    let db = Arc::new(db);

    let browser = BrowserEngine::launch(&config.browser, &config.scraping)
        .await
        .context("failed to launch Chromium")?;
    let verifier = DnsDomainVerifier::new(&config.enrichment);
    let backup_dir = AppConfig::data_dir()?.join("backups");

    let state = AppState::new(
        config,
        Arc::clone(&db),
        Arc::new(browser),
        Arc::new(verifier),
        Arc::new(LettreMailer),
        backup_dir,
    )?;

    maintenance::spawn_daily_reset(Arc::clone(&db));
    leadforge_server::serve(state).await
}
