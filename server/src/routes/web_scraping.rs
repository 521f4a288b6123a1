//! `/api/web-scraping`: ad-hoc scraping of listing sources and company websites.
//!
//! Bulk jobs run in the background and are tracked in `scraping_jobs`; their
//! listings are also stored as leads so they show up in the CRM.

use crate::error::{parse_id, ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use leadforge_core::JobStatus;
use leadforge_db::leads;
use leadforge_db::scraping_jobs::{self, ScrapingJob, ScrapingStats};
use leadforge_db::Database;
use leadforge_prospecting::scraped_lead_input;
use leadforge_scraper::{
    dedup_leads, enrich_lead, ContactInfo, ScrapedBusiness, ScrapedLead, ScrapingEngine, Source,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const RECENT_JOBS: u32 = 50;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/bulk-scrape", post(bulk_scrape))
        .route("/job/{id}", get(get_job))
        .route("/jobs", get(list_jobs))
        .route("/scrape-source", post(scrape_source))
        .route("/scrape-website", post(scrape_website))
        .route("/stats", get(stats))
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Deduplicate, score and store listings as leads. Returns how many were stored.
async fn store_leads(db: &Database, businesses: Vec<ScrapedBusiness>, max_results: usize) -> usize {
    let candidates = dedup_leads(businesses.into_iter().map(ScrapedLead::from).collect());
    let mut stored = 0;
    for lead in candidates.into_iter().take(max_results).map(enrich_lead) {
        let company = lead.company_name.clone();
        match leads::upsert(db.pool(), &scraped_lead_input(lead)).await {
            Ok(_) => stored += 1,
            Err(e) => tracing::warn!(target: "scraper", "Failed to store lead {}: {}", company, e),
        }
    }
    stored
}

// ============ GET /health ============

async fn health(State(state): State<AppState>) -> Json<Value> {
    let sources: Vec<&str> = state.scraper.sources().iter().map(|s| s.as_str()).collect();
    Json(json!({
        "status": "healthy",
        "service": "web-scraping",
        "sources": sources,
        "timestamp": Utc::now(),
    }))
}

// ============ POST /bulk-scrape ============

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BulkScrapeRequest {
    query: Option<String>,
    location: Option<String>,
    sources: Option<Vec<String>>,
    #[serde(alias = "max_results")]
    max_results: Option<u32>,
}

#[derive(Serialize)]
struct JobStarted {
    message: &'static str,
    job_id: i64,
    status: JobStatus,
}

async fn bulk_scrape(
    State(state): State<AppState>,
    body: Result<Json<BulkScrapeRequest>, JsonRejection>,
) -> ApiResult<Json<JobStarted>> {
    let Json(request) = body?;
    let query = required(request.query)
        .ok_or_else(|| ApiError::bad_request("Query parameter is required"))?;
    let location = request.location.unwrap_or_default().trim().to_string();
    let names = request
        .sources
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| vec!["all".to_string()]);
    let sources = Source::parse_list(&names)?;
    let max_results = request.max_results.unwrap_or(100).max(1);

    let source_names: Vec<String> = sources.iter().map(|s| s.as_str().to_string()).collect();
    let job = scraping_jobs::create(
        state.db.pool(),
        &query,
        &location,
        &source_names,
        i64::from(max_results),
    )
    .await?;
    tracing::info!(target: "scraper", job_id = job.id, %query, "Bulk scraping job started");

    tokio::spawn(run_bulk_job(
        Arc::clone(&state.db),
        Arc::clone(&state.scraper),
        job.id,
        query,
        location,
        sources,
        usize::try_from(max_results).unwrap_or(usize::MAX),
    ));

    Ok(Json(JobStarted {
        message: "Scraping job started",
        job_id: job.id,
        status: job.status,
    }))
}

async fn run_bulk_job(
    db: Arc<Database>,
    scraper: Arc<ScrapingEngine>,
    job_id: i64,
    query: String,
    location: String,
    sources: Vec<Source>,
    max_results: usize,
) {
    let bulk = scraper.bulk_scrape(&query, &location, &sources).await;
    let results = match serde_json::to_value(&bulk) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!(target: "scraper", job_id, "Failed to serialize scraping results: {}", e);
            if let Err(e) = scraping_jobs::fail(db.pool(), job_id, &e.to_string()).await {
                tracing::error!(target: "scraper", job_id, "Failed to mark job failed: {}", e);
            }
            return;
        }
    };

    let total = i64::try_from(bulk.total_results).unwrap_or(i64::MAX);
    let businesses = bulk.results.into_values().flatten().collect();
    let stored = store_leads(&db, businesses, max_results).await;

    match scraping_jobs::complete(db.pool(), job_id, &results, total).await {
        Ok(()) => tracing::info!(target: "scraper", job_id, total, stored, "Bulk scraping job completed"),
        Err(e) => {
            tracing::error!(target: "scraper", job_id, "Failed to complete scraping job: {}", e);
            if let Err(e) = scraping_jobs::fail(db.pool(), job_id, &e.to_string()).await {
                tracing::error!(target: "scraper", job_id, "Failed to mark job failed: {}", e);
            }
        }
    }
}

// ============ GET /job/{id} ============

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ScrapingJob>> {
    let id = parse_id(&id, "job")?;
    scraping_jobs::get(state.db.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

// ============ GET /jobs ============

async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let jobs = scraping_jobs::list(state.db.pool(), RECENT_JOBS).await?;
    Ok(Json(json!({ "total": jobs.len(), "jobs": jobs })))
}

// ============ POST /scrape-source ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrapeSourceRequest {
    source: Option<String>,
    query: Option<String>,
    location: Option<String>,
}

#[derive(Serialize)]
struct SourceResults {
    source: String,
    query: String,
    location: String,
    results_count: usize,
    stored_leads: usize,
    results: Vec<ScrapedBusiness>,
}

async fn scrape_source(
    State(state): State<AppState>,
    body: Result<Json<ScrapeSourceRequest>, JsonRejection>,
) -> ApiResult<Json<SourceResults>> {
    let Json(request) = body?;
    let (Some(source_name), Some(query)) = (required(request.source), required(request.query))
    else {
        return Err(ApiError::bad_request("Source and query parameters are required"));
    };
    let location = request.location.unwrap_or_default().trim().to_string();

    // `all` and `job_boards` expand to several sources.
    let sources = Source::parse_list(&[source_name.as_str()])?;
    let mut results = Vec::new();
    for source in sources {
        results.extend(state.scraper.try_scrape_source(source, &query, &location).await?);
    }

    let stored_leads = store_leads(&state.db, results.clone(), results.len()).await;
    Ok(Json(SourceResults {
        source: source_name,
        query,
        location,
        results_count: results.len(),
        stored_leads,
        results,
    }))
}

// ============ POST /scrape-website ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScrapeWebsiteRequest {
    #[serde(alias = "websiteUrl")]
    website_url: Option<String>,
}

#[derive(Serialize)]
struct WebsiteResults {
    website_url: String,
    contact_info: ContactInfo,
    success: bool,
}

async fn scrape_website(
    State(state): State<AppState>,
    body: Result<Json<ScrapeWebsiteRequest>, JsonRejection>,
) -> ApiResult<Json<WebsiteResults>> {
    let Json(request) = body?;
    let website_url = required(request.website_url)
        .ok_or_else(|| ApiError::bad_request("Website URL is required"))?;
    let contact_info = state.website_scraper.scrape_contact_page(&website_url).await?;
    Ok(Json(WebsiteResults {
        website_url,
        success: contact_info.has_contact(),
        contact_info,
    }))
}

// ============ GET /stats ============

async fn stats(State(state): State<AppState>) -> ApiResult<Json<ScrapingStats>> {
    Ok(Json(scraping_jobs::stats(state.db.pool()).await?))
}
