//! Bulk scraping job records.

use crate::error::{DatabaseError, Result};
use crate::stats::round1;
use crate::{now_string, parse_optional_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use leadforge_core::JobStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A bulk scraping job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingJob {
    /// Row id
    pub id: i64,
    /// Search query
    pub query: String,
    /// Location, empty when not given
    pub location: String,
    /// Requested sources
    pub sources: Vec<String>,
    /// Result cap
    pub max_results: i64,
    /// Lifecycle status
    pub status: JobStatus,
    /// Per-source results once finished
    pub results: Option<JsonValue>,
    /// Number of results
    pub total_results: i64,
    /// Failure reason
    pub error: Option<String>,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: Option<DateTime<Utc>>,
}

fn job_from_row(row: &SqliteRow) -> Result<ScrapingJob> {
    let sources: String = row.try_get("sources")?;
    let results: Option<String> = row.try_get("results")?;
    let status: String = row.try_get("status")?;
    let started_at: String = row.try_get("started_at")?;

    Ok(ScrapingJob {
        id: row.try_get("id")?,
        query: row.try_get("query")?,
        location: row.try_get("location")?,
        sources: serde_json::from_str(&sources)?,
        max_results: row.try_get("max_results")?,
        status: JobStatus::parse(&status),
        results: results
            .as_deref()
            .map(serde_json::from_str::<JsonValue>)
            .transpose()?,
        total_results: row.try_get("total_results")?,
        error: row.try_get("error")?,
        started_at: parse_timestamp(&started_at)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
    })
}

/// Create a job that is already `processing`.
pub async fn create(
    pool: &SqlitePool,
    query: &str,
    location: &str,
    sources: &[String],
    max_results: i64,
) -> Result<ScrapingJob> {
    let result = sqlx::query(
        "INSERT INTO scraping_jobs (query, location, sources, max_results, status, started_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(query)
    .bind(location)
    .bind(serde_json::to_string(sources)?)
    .bind(max_results)
    .bind(JobStatus::Processing.to_string())
    .bind(now_string())
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid())
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// Fetch a job.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<ScrapingJob>> {
    let row = sqlx::query("SELECT * FROM scraping_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Most recent jobs first.
pub async fn list(pool: &SqlitePool, limit: u32) -> Result<Vec<ScrapingJob>> {
    let rows = sqlx::query("SELECT * FROM scraping_jobs ORDER BY started_at DESC, id DESC LIMIT ?")
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;
    rows.iter().map(job_from_row).collect()
}

/// Store results and mark the job completed.
pub async fn complete(
    pool: &SqlitePool,
    id: i64,
    results: &JsonValue,
    total_results: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE scraping_jobs
         SET status = 'completed', results = ?, total_results = ?, completed_at = ?
         WHERE id = ?",
    )
    .bind(serde_json::to_string(results)?)
    .bind(total_results)
    .bind(now_string())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark the job failed.
pub async fn fail(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query(
        "UPDATE scraping_jobs SET status = 'failed', error = ?, completed_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(now_string())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Scraping service totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingStats {
    /// All jobs
    pub total_jobs: i64,
    /// Completed jobs
    pub completed_jobs: i64,
    /// Failed jobs
    pub failed_jobs: i64,
    /// Jobs still running
    pub running_jobs: i64,
    /// Results across all jobs
    pub total_results: i64,
    /// Results per job, one decimal
    pub average_results_per_job: f64,
}

/// Totals across all scraping jobs.
#[allow(clippy::cast_precision_loss)]
pub async fn stats(pool: &SqlitePool) -> Result<ScrapingStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN status IN ('pending', 'processing') THEN 1 ELSE 0 END), 0) AS running,
                COALESCE(SUM(total_results), 0) AS results
         FROM scraping_jobs",
    )
    .fetch_one(pool)
    .await?;

    let total_jobs: i64 = row.try_get("total")?;
    let total_results: i64 = row.try_get("results")?;
    Ok(ScrapingStats {
        total_jobs,
        completed_jobs: row.try_get("completed")?,
        failed_jobs: row.try_get("failed")?,
        running_jobs: row.try_get("running")?,
        total_results,
        average_results_per_job: if total_jobs == 0 {
            0.0
        } else {
            round1(total_results as f64 / total_jobs as f64)
        },
    })
}
