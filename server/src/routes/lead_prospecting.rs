//! `/api/lead-prospecting`: start, follow, inspect and cancel prospecting jobs.

use super::Pagination;
use crate::error::{parse_id, ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use futures::{Stream, StreamExt};
use leadforge_core::TimeRange;
use leadforge_db::leads::{self, Lead};
use leadforge_db::lead_emails::{self, EmailStats};
use leadforge_db::prospecting_jobs::{self, JobListQuery, JobStats, ProspectingJob};
use leadforge_prospecting::SearchCriteria;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/leads", get(job_leads))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .route("/progress/{id}", get(progress))
        .route("/debug/{id}", get(debug))
        .route("/stats", get(stats))
        .route("/email-stats", get(email_stats))
}

// ============ POST /start ============

#[derive(Serialize)]
struct Started {
    success: bool,
    job_id: i64,
    status: &'static str,
    message: &'static str,
    search_criteria: SearchCriteria,
}

async fn start(
    State(state): State<AppState>,
    body: Result<Json<SearchCriteria>, JsonRejection>,
) -> ApiResult<Json<Started>> {
    let Json(criteria) = body?;
    let job_id = state.orchestrator.start_job(criteria.clone()).await?;
    Ok(Json(Started {
        success: true,
        job_id,
        status: "pending",
        message: "Lead prospecting started successfully",
        search_criteria: criteria,
    }))
}

// ============ GET /jobs ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobListParams {
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

/// RFC 3339 timestamps, or plain `YYYY-MM-DD` dates taken at `time_of_day`.
fn parse_date(raw: &str, field: &str, time_of_day: NaiveTime) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(time_of_day).and_utc())
        .map_err(|_| ApiError::bad_request(format!("Invalid {field}: {raw}")))
}

fn optional_date(raw: Option<&str>, field: &str, time_of_day: NaiveTime) -> ApiResult<Option<DateTime<Utc>>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse_date(s, field, time_of_day))
        .transpose()
}

#[derive(Serialize)]
struct JobList {
    success: bool,
    jobs: Vec<ProspectingJob>,
    pagination: Pagination,
}

async fn list_jobs(
    State(state): State<AppState>,
    params: Result<Query<JobListParams>, QueryRejection>,
) -> ApiResult<Json<JobList>> {
    let Query(params) = params?;
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    let query = JobListQuery {
        status: params.status.filter(|s| !s.is_empty()),
        date_from: optional_date(params.date_from.as_deref(), "date_from", NaiveTime::MIN)?,
        date_to: optional_date(params.date_to.as_deref(), "date_to", end_of_day)?,
        page: params.page.unwrap_or(1).max(1),
        limit: params.limit.unwrap_or(20).clamp(1, 100),
    };

    let (jobs, total) = prospecting_jobs::list(state.db.pool(), &query).await?;
    Ok(Json(JobList {
        success: true,
        jobs,
        pagination: Pagination::new(query.page, query.limit, total),
    }))
}

// ============ GET /jobs/{id} ============

async fn find_job(state: &AppState, raw_id: &str) -> ApiResult<ProspectingJob> {
    let id = parse_id(raw_id, "job")?;
    prospecting_jobs::get(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let job = find_job(&state, &id).await?;
    Ok(Json(json!({ "success": true, "job": job })))
}

// ============ GET /jobs/{id}/leads ============

#[derive(Serialize)]
struct JobLeads {
    success: bool,
    job_id: i64,
    total: usize,
    leads: Vec<Lead>,
}

async fn job_leads(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<JobLeads>> {
    let job = find_job(&state, &id).await?;
    let leads = leads::list_by_job(state.db.pool(), job.id).await?;
    Ok(Json(JobLeads {
        success: true,
        job_id: job.id,
        total: leads.len(),
        leads,
    }))
}

// ============ POST /jobs/{id}/cancel ============

async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "job")?;
    let job = state.orchestrator.cancel_job(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Job cancelled successfully",
        "job": job,
    })))
}

// ============ GET /progress/{id} ============

/// Server-sent progress events until the job reaches a final state.
async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let id = parse_id(&id, "job")?;
    let events = state
        .orchestrator
        .progress_events(id, state.orchestrator.poll_interval())
        .map(|event| Event::default().event(event.event_name()).json_data(&event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// ============ GET /debug/{id} ============

async fn debug(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "job")?;
    let info = state.orchestrator.debug_info(id).await?;
    let total_leads_in_table = leadforge_db::stats::count_leads(state.db.pool()).await?;
    Ok(Json(json!({
        "success": true,
        "job": info.job,
        "database_info": {
            "total_leads_in_table": total_leads_in_table,
            "job_leads": info.stored_leads,
        },
        "debug_info": {
            "current_time": Utc::now(),
            "job_age_minutes": info.job_age_minutes,
            "is_running": info.is_running,
        },
    })))
}

// ============ GET /stats ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsParams {
    time_range: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    success: bool,
    time_range: TimeRange,
    stats: JobStats,
}

async fn stats(
    State(state): State<AppState>,
    params: Result<Query<StatsParams>, QueryRejection>,
) -> ApiResult<Json<Stats>> {
    let Query(params) = params?;
    let range = TimeRange::parse_or_default(params.time_range.as_deref());
    Ok(Json(Stats {
        success: true,
        time_range: range,
        stats: state.orchestrator.stats(range).await?,
    }))
}

// ============ GET /email-stats ============

#[derive(Serialize)]
struct EmailStatsResponse {
    success: bool,
    stats: EmailStats,
}

async fn email_stats(State(state): State<AppState>) -> ApiResult<Json<EmailStatsResponse>> {
    let threshold = i64::from(state.config.enrichment.high_confidence_score);
    Ok(Json(EmailStatsResponse {
        success: true,
        stats: lead_emails::email_stats(state.db.pool(), threshold).await?,
    }))
}
