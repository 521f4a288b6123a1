//! Prospecting job tracking.
//!
//! A job moves `pending -> processing -> completed | failed | cancelled`.
//! Terminal states are never overwritten: every transition below is guarded
//! with `status NOT IN ('completed', 'failed', 'cancelled')`.

use crate::error::{DatabaseError, Result};
use crate::{format_timestamp, now_string, parse_optional_timestamp, parse_timestamp, Filter};
use chrono::{DateTime, Utc};
use leadforge_core::{JobStatus, ProspectingStep};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed', 'cancelled')";

/// A prospecting job row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectingJob {
    /// Row id
    pub id: i64,
    /// Normalised search criteria as submitted
    pub search_criteria: JsonValue,
    /// Lifecycle status
    pub status: JobStatus,
    /// Progress percentage
    pub progress: u8,
    /// Current pipeline step
    pub current_step: ProspectingStep,
    /// Leads stored by the job
    pub total_leads: i64,
    /// Final statistics (set on completion)
    pub statistics: Option<JsonValue>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
    /// When processing began
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

fn job_from_row(row: &SqliteRow) -> Result<ProspectingJob> {
    let criteria: String = row.try_get("search_criteria")?;
    let statistics: Option<String> = row.try_get("statistics")?;
    let status: String = row.try_get("status")?;
    let step: String = row.try_get("current_step")?;
    let progress: i64 = row.try_get("progress")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(ProspectingJob {
        id: row.try_get("id")?,
        search_criteria: serde_json::from_str(&criteria)?,
        status: JobStatus::parse(&status),
        progress: u8::try_from(progress.clamp(0, 100)).unwrap_or(0),
        current_step: ProspectingStep::parse(&step),
        total_leads: row.try_get("total_leads")?,
        statistics: statistics
            .as_deref()
            .map(serde_json::from_str::<JsonValue>)
            .transpose()?,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        started_at: parse_optional_timestamp(row.try_get("started_at")?)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
    })
}

/// Create a job in `pending` state.
pub async fn create(pool: &SqlitePool, search_criteria: &JsonValue) -> Result<ProspectingJob> {
    let now = now_string();
    let result = sqlx::query(
        "INSERT INTO prospecting_jobs (search_criteria, status, progress, current_step, created_at, updated_at)
         VALUES (?, ?, 0, ?, ?, ?)",
    )
    .bind(serde_json::to_string(search_criteria)?)
    .bind(JobStatus::Pending.to_string())
    .bind(ProspectingStep::Initializing.to_string())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid())
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// Fetch a job.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<ProspectingJob>> {
    let row = sqlx::query("SELECT * FROM prospecting_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Move a non-terminal job to `status`. Entering `processing` stamps `started_at`.
///
/// Returns whether the job was updated.
pub async fn set_status(pool: &SqlitePool, id: i64, status: JobStatus) -> Result<bool> {
    let now = now_string();
    let sql = format!(
        "UPDATE prospecting_jobs
         SET status = ?, updated_at = ?,
             started_at = CASE WHEN ? = 'processing' THEN COALESCE(started_at, ?) ELSE started_at END
         WHERE id = ? AND {NOT_TERMINAL}"
    );
    let result = sqlx::query(&sql)
        .bind(status.to_string())
        .bind(&now)
        .bind(status.to_string())
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Record the current step and its progress value.
pub async fn set_progress(pool: &SqlitePool, id: i64, step: ProspectingStep) -> Result<bool> {
    let sql = format!(
        "UPDATE prospecting_jobs SET current_step = ?, progress = ?, updated_at = ?
         WHERE id = ? AND {NOT_TERMINAL}"
    );
    let result = sqlx::query(&sql)
        .bind(step.to_string())
        .bind(i64::from(step.progress()))
        .bind(now_string())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a job completed with its statistics.
pub async fn complete(
    pool: &SqlitePool,
    id: i64,
    total_leads: i64,
    statistics: &JsonValue,
) -> Result<bool> {
    let now = now_string();
    let sql = format!(
        "UPDATE prospecting_jobs
         SET status = 'completed', progress = 100, current_step = 'completed',
             total_leads = ?, statistics = ?, completed_at = ?, updated_at = ?
         WHERE id = ? AND {NOT_TERMINAL}"
    );
    let result = sqlx::query(&sql)
        .bind(total_leads)
        .bind(serde_json::to_string(statistics)?)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a job failed.
pub async fn fail(pool: &SqlitePool, id: i64, error: &str) -> Result<bool> {
    let now = now_string();
    let sql = format!(
        "UPDATE prospecting_jobs
         SET status = 'failed', error_message = ?, completed_at = ?, updated_at = ?
         WHERE id = ? AND {NOT_TERMINAL}"
    );
    let result = sqlx::query(&sql)
        .bind(error)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Cancel a job.
///
/// # Errors
/// `NotFoundWithMessage` for an unknown job, `Conflict` for a job that
/// already reached a terminal state.
pub async fn cancel(pool: &SqlitePool, id: i64) -> Result<ProspectingJob> {
    let job = get(pool, id)
        .await?
        .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("Job {id} not found")))?;
    if job.status.is_terminal() {
        return Err(DatabaseError::Conflict(format!(
            "Job {id} is already {}",
            job.status
        )));
    }

    let now = now_string();
    let sql = format!(
        "UPDATE prospecting_jobs SET status = 'cancelled', completed_at = ?, updated_at = ?
         WHERE id = ? AND {NOT_TERMINAL}"
    );
    sqlx::query(&sql)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;

    get(pool, id).await?.ok_or(DatabaseError::NotFound)
}

/// Filters for [`list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobListQuery {
    /// Exact status
    pub status: Option<String>,
    /// Created at or after
    pub date_from: Option<DateTime<Utc>>,
    /// Created at or before
    pub date_to: Option<DateTime<Utc>>,
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
}

impl Default for JobListQuery {
    fn default() -> Self {
        Self {
            status: None,
            date_from: None,
            date_to: None,
            page: 1,
            limit: 20,
        }
    }
}

/// List jobs newest first. Returns the page and the unpaged total.
pub async fn list(pool: &SqlitePool, query: &JobListQuery) -> Result<(Vec<ProspectingJob>, i64)> {
    let mut filter = Filter::default();
    filter.eq("status", query.status.as_deref());
    if let Some(from) = &query.date_from {
        filter.push("created_at >= ?", [format_timestamp(from)]);
    }
    if let Some(to) = &query.date_to {
        filter.push("created_at <= ?", [format_timestamp(to)]);
    }

    let count_sql = format!("SELECT COUNT(*) FROM prospecting_jobs{}", filter.sql());
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in filter.args() {
        count_query = count_query.bind(arg);
    }
    let total = count_query.fetch_one(pool).await?;

    let limit = i64::from(query.limit.clamp(1, 100));
    let offset = i64::from(query.page.max(1) - 1) * limit;
    let sql = format!(
        "SELECT * FROM prospecting_jobs{} ORDER BY created_at DESC, id DESC LIMIT {limit} OFFSET {offset}",
        filter.sql()
    );
    let mut rows_query = sqlx::query(&sql);
    for arg in filter.args() {
        rows_query = rows_query.bind(arg);
    }
    let rows = rows_query.fetch_all(pool).await?;
    let jobs = rows.iter().map(job_from_row).collect::<Result<Vec<_>>>()?;
    Ok((jobs, total))
}

/// Aggregate job statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    /// Jobs in the window
    pub total_jobs: i64,
    /// Completed jobs
    pub completed_jobs: i64,
    /// Failed jobs
    pub failed_jobs: i64,
    /// Pending or processing jobs
    pub active_jobs: i64,
    /// `completed / total * 100`, one decimal
    pub success_rate: f64,
    /// Leads per completed job, one decimal
    pub average_leads_per_job: f64,
    /// Leads across all jobs
    pub total_leads: i64,
    /// Five most recent jobs
    pub recent_jobs: Vec<ProspectingJob>,
}

/// Statistics over jobs created at or after `since`.
#[allow(clippy::cast_precision_loss)]
pub async fn stats_since(pool: &SqlitePool, since: &DateTime<Utc>) -> Result<JobStats> {
    let since = format_timestamp(since);
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN status IN ('pending', 'processing') THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(total_leads), 0) AS leads
         FROM prospecting_jobs WHERE created_at >= ?",
    )
    .bind(&since)
    .fetch_one(pool)
    .await?;

    let total_jobs: i64 = row.try_get("total")?;
    let completed_jobs: i64 = row.try_get("completed")?;
    let total_leads: i64 = row.try_get("leads")?;

    let recent = sqlx::query(
        "SELECT * FROM prospecting_jobs WHERE created_at >= ?
         ORDER BY created_at DESC, id DESC LIMIT 5",
    )
    .bind(&since)
    .fetch_all(pool)
    .await?;

    let average_leads_per_job = if completed_jobs == 0 {
        0.0
    } else {
        crate::stats::round1(total_leads as f64 / completed_jobs as f64)
    };

    Ok(JobStats {
        total_jobs,
        completed_jobs,
        failed_jobs: row.try_get("failed")?,
        active_jobs: row.try_get("active")?,
        success_rate: crate::stats::percentage(completed_jobs, total_jobs),
        average_leads_per_job,
        total_leads,
        recent_jobs: recent.iter().map(job_from_row).collect::<Result<Vec<_>>>()?,
    })
}
