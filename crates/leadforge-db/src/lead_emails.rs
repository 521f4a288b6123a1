//! Generated and verified email candidates per lead.

use crate::error::Result;
use crate::stats::{percentage, round1, NameCount};
use crate::{format_timestamp, now_string, parse_optional_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{Row, SqlitePool};

/// An email candidate to store for a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLeadEmail {
    /// Address
    pub email: String,
    /// Pattern it was generated from, e.g. `generic@domain.com`
    pub pattern: String,
    /// Generator confidence in `0.0..=1.0`
    pub confidence: f64,
    /// Passed the syntax check
    pub is_valid_format: bool,
    /// Verification score 0..=100
    pub overall_score: i64,
    /// Domain verification details
    pub domain_info: Option<JsonValue>,
    /// When verification ran
    pub verified_at: Option<DateTime<Utc>>,
}

/// A stored email candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEmail {
    /// Row id
    pub id: i64,
    /// Owning lead
    pub lead_id: i64,
    /// Candidate fields
    #[serde(flatten)]
    pub email: NewLeadEmail,
}

/// Store candidates for a lead. Duplicate addresses for the same lead are
/// skipped. Returns the number of rows inserted.
pub async fn insert_many(pool: &SqlitePool, lead_id: i64, emails: &[NewLeadEmail]) -> Result<u64> {
    let now = now_string();
    let mut inserted = 0;
    for email in emails {
        let domain_info = email
            .domain_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let result = sqlx::query(
            "INSERT INTO lead_emails (lead_id, email, pattern, confidence, is_valid_format,
                                      overall_score, domain_info, verified_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(lead_id, email) DO NOTHING",
        )
        .bind(lead_id)
        .bind(&email.email)
        .bind(&email.pattern)
        .bind(email.confidence)
        .bind(email.is_valid_format)
        .bind(email.overall_score)
        .bind(domain_info)
        .bind(email.verified_at.as_ref().map(format_timestamp))
        .bind(&now)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Candidates for a lead, best score first.
pub async fn list_for_lead(pool: &SqlitePool, lead_id: i64) -> Result<Vec<LeadEmail>> {
    let rows = sqlx::query(
        "SELECT * FROM lead_emails WHERE lead_id = ?
         ORDER BY overall_score DESC, confidence DESC, id ASC",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let domain_info: Option<String> = row.try_get("domain_info")?;
            Ok(LeadEmail {
                id: row.try_get("id")?,
                lead_id: row.try_get("lead_id")?,
                email: NewLeadEmail {
                    email: row.try_get("email")?,
                    pattern: row.try_get("pattern")?,
                    confidence: row.try_get("confidence")?,
                    is_valid_format: row.try_get("is_valid_format")?,
                    overall_score: row.try_get("overall_score")?,
                    domain_info: domain_info
                        .as_deref()
                        .map(serde_json::from_str::<JsonValue>)
                        .transpose()?,
                    verified_at: parse_optional_timestamp(row.try_get("verified_at")?)?,
                },
            })
        })
        .collect()
}

/// Total number of stored candidates.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM lead_emails")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Email enrichment quality across all leads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailStats {
    /// Stored candidates
    pub total_emails: i64,
    /// Candidates with a valid format
    pub valid_emails: i64,
    /// Candidates scoring at or above the threshold
    pub high_confidence_emails: i64,
    /// Mean score, one decimal
    pub average_score: f64,
    /// Percentage of candidates whose domain has MX records
    pub domain_verification_rate: f64,
    /// Ten most common domains
    pub top_domains: Vec<NameCount>,
}

/// Aggregate enrichment statistics. `high_confidence_score` is the score
/// threshold for the high-confidence bucket.
pub async fn email_stats(pool: &SqlitePool, high_confidence_score: i64) -> Result<EmailStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS total,
                COALESCE(SUM(is_valid_format), 0) AS valid,
                COALESCE(SUM(CASE WHEN overall_score >= ? THEN 1 ELSE 0 END), 0) AS high,
                COALESCE(AVG(overall_score), 0.0) AS average,
                COALESCE(SUM(CASE WHEN json_extract(domain_info, '$.has_mx_records') = 1 THEN 1 ELSE 0 END), 0) AS verified
         FROM lead_emails",
    )
    .bind(high_confidence_score)
    .fetch_one(pool)
    .await?;

    let total_emails: i64 = row.try_get("total")?;
    let verified: i64 = row.try_get("verified")?;
    let average: f64 = row.try_get("average")?;

    let domains = sqlx::query(
        "SELECT lower(substr(email, instr(email, '@') + 1)) AS name, COUNT(*) AS count
         FROM lead_emails
         WHERE instr(email, '@') > 0
         GROUP BY 1
         ORDER BY count DESC, name ASC
         LIMIT 10",
    )
    .fetch_all(pool)
    .await?;

    Ok(EmailStats {
        total_emails,
        valid_emails: row.try_get("valid")?,
        high_confidence_emails: row.try_get("high")?,
        average_score: round1(average),
        domain_verification_rate: percentage(verified, total_emails),
        top_domains: domains
            .iter()
            .map(|r| {
                Ok(NameCount {
                    name: r.try_get("name")?,
                    count: r.try_get("count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
    })
}
