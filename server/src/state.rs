//! Shared application state.

use crate::rate_limit::RateLimiter;
use leadforge_browser::PageFetcher;
use leadforge_core::AppConfig;
use leadforge_db::Database;
use leadforge_enrichment::{DomainVerifier, EmailEnricher};
use leadforge_mail::Mailer;
use leadforge_prospecting::ProspectingOrchestrator;
use leadforge_scraper::{ScrapingEngine, WebsiteScraper};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Services shared by every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<AppConfig>,
    /// Database handle
    pub db: Arc<Database>,
    /// Prospecting job runner
    pub orchestrator: ProspectingOrchestrator,
    /// Listing scraper used by the web scraping routes
    pub scraper: Arc<ScrapingEngine>,
    /// Contact page scraper
    pub website_scraper: WebsiteScraper,
    /// SMTP delivery
    pub mailer: Arc<dyn Mailer>,
    /// Limits `/api` requests per client
    pub rate_limiter: Arc<RateLimiter>,
    /// Where `POST /api/database/backup` writes
    pub backup_dir: PathBuf,
}

impl AppState {
    /// Wire services together over the network-facing pieces.
    pub fn new(
        config: AppConfig,
        db: Arc<Database>,
        fetcher: Arc<dyn PageFetcher>,
        verifier: Arc<dyn DomainVerifier>,
        mailer: Arc<dyn Mailer>,
        backup_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let scraper = Arc::new(ScrapingEngine::new(fetcher, &config.scraping)?);
        let website_scraper =
            WebsiteScraper::new(Duration::from_secs(config.scraping.request_timeout_secs))?;
        let enricher = Arc::new(EmailEnricher::new(verifier, config.enrichment.clone()));
        let orchestrator = ProspectingOrchestrator::new(
            Arc::clone(&db),
            Arc::clone(&scraper),
            enricher,
            config.prospecting.clone(),
        );
        let rate_limiter = Arc::new(RateLimiter::new(
            config.server.api_rate_limit_requests,
            Duration::from_secs(config.server.api_rate_limit_window_secs),
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            orchestrator,
            scraper,
            website_scraper,
            mailer,
            rate_limiter,
            backup_dir,
        })
    }
}
