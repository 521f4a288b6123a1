//! Lead aggregations backing the dashboard, analytics and export reports.

use crate::error::Result;
use crate::leads::{lead_from_row, Lead};
use crate::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, HashMap};

/// Lead column that can be grouped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupColumn {
    /// `status`
    Status,
    /// `industry`
    Industry,
    /// `city`
    City,
    /// `state`
    State,
    /// `country`
    Country,
    /// `source`
    Source,
}

impl GroupColumn {
    fn column(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Industry => "industry",
            Self::City => "city",
            Self::State => "state",
            Self::Country => "country",
            Self::Source => "source",
        }
    }
}

/// A group label with its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    /// Group value
    pub name: String,
    /// Rows in the group
    pub count: i64,
}

/// Total number of leads.
pub async fn count_leads(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Leads created at or after `since`.
pub async fn count_leads_since(pool: &SqlitePool, since: &DateTime<Utc>) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE created_at >= ?")
        .bind(format_timestamp(since))
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Leads currently in `status`.
pub async fn count_with_status(pool: &SqlitePool, status: &str) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE status = ?")
        .bind(status)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Count leads grouped by `column`, largest groups first.
///
/// With `null_label`, null and empty values are counted under that label;
/// without it they are left out. `since` restricts to leads created at or
/// after that instant.
pub async fn count_by(
    pool: &SqlitePool,
    column: GroupColumn,
    null_label: Option<&str>,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<NameCount>> {
    let col = column.column();
    let mut clauses = Vec::new();
    if null_label.is_none() {
        clauses.push(format!("{col} IS NOT NULL AND {col} != ''"));
    }
    if since.is_some() {
        clauses.push("created_at >= ?".to_string());
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT COALESCE(NULLIF({col}, ''), ?) AS name, COUNT(*) AS count
         FROM leads{where_sql}
         GROUP BY 1
         ORDER BY count DESC, name ASC"
    );

    let mut query = sqlx::query(&sql).bind(null_label.unwrap_or_default());
    if let Some(since) = since {
        query = query.bind(format_timestamp(since));
    }
    let rows = query.fetch_all(pool).await?;

    rows.iter()
        .map(|row| {
            Ok(NameCount {
                name: row.try_get("name")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Most recently created leads.
pub async fn recent_leads(pool: &SqlitePool, limit: u32) -> Result<Vec<Lead>> {
    let rows = sqlx::query("SELECT * FROM leads ORDER BY created_at DESC, id DESC LIMIT ?")
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;
    rows.iter().map(lead_from_row).collect()
}

/// Number of distinct company names.
pub async fn unique_companies(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT company_name) FROM leads WHERE company_name != ''",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Leads created on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCount {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Leads created that day
    pub count: i64,
}

/// Leads created per day since `since`, oldest day first.
pub async fn daily_counts_since(pool: &SqlitePool, since: &DateTime<Utc>) -> Result<Vec<DateCount>> {
    let rows = sqlx::query(
        "SELECT substr(created_at, 1, 10) AS date, COUNT(*) AS count
         FROM leads
         WHERE created_at >= ?
         GROUP BY 1
         ORDER BY 1 ASC",
    )
    .bind(format_timestamp(since))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DateCount {
                date: row.try_get("date")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}

/// Bucket size for [`growth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthPeriod {
    /// `YYYY-MM`
    #[default]
    Monthly,
    /// `YYYY-Wnn`, week of month
    Weekly,
    /// `YYYY-MM-DD`
    Daily,
}

impl GrowthPeriod {
    /// Parse a query value. Anything other than `monthly` or `weekly` is daily.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "monthly" => Self::Monthly,
            "weekly" => Self::Weekly,
            _ => Self::Daily,
        }
    }

    /// Bucket label for a creation instant.
    #[must_use]
    pub fn bucket(self, at: &DateTime<Utc>) -> String {
        match self {
            Self::Monthly => at.format("%Y-%m").to_string(),
            Self::Weekly => {
                // Week of month, counting the partial first week.
                let first_weekday = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
                    .map_or(0, |d| d.weekday().num_days_from_sunday());
                let week = (at.day() + first_weekday).div_ceil(7);
                format!("{}-W{week:02}", at.year())
            }
            Self::Daily => at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A growth bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    /// Bucket label
    pub period: String,
    /// Leads created in the bucket
    pub count: i64,
}

async fn created_since(pool: &SqlitePool, since: &DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT created_at FROM leads WHERE created_at >= ?")
        .bind(format_timestamp(since))
        .fetch_all(pool)
        .await?;
    rows.iter().map(|s| parse_timestamp(s)).collect()
}

/// Lead growth since `since`, grouped by `period` and sorted by label.
pub async fn growth(
    pool: &SqlitePool,
    period: GrowthPeriod,
    since: &DateTime<Utc>,
) -> Result<Vec<PeriodCount>> {
    let mut buckets: BTreeMap<String, i64> = BTreeMap::new();
    for at in created_since(pool, since).await? {
        *buckets.entry(period.bucket(&at)).or_default() += 1;
    }
    Ok(buckets
        .into_iter()
        .map(|(period, count)| PeriodCount { period, count })
        .collect())
}

/// Per-source funnel numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePerformance {
    /// Source label (`Unknown` when unset)
    pub source: String,
    /// All leads from this source
    pub total: i64,
    /// Leads still `new`
    pub new: i64,
    /// Leads `contacted`
    pub contacted: i64,
    /// Leads `interested`
    pub interested: i64,
    /// Leads `closed`
    pub closed: i64,
    /// `(interested + closed) / total * 100`, one decimal
    pub conversion_rate: f64,
}

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of `part` in `total`, one decimal; 0 for an empty total.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 / total as f64 * 100.0)
    }
}

/// Funnel numbers per source, largest sources first.
pub async fn source_performance(pool: &SqlitePool) -> Result<Vec<SourcePerformance>> {
    let rows = sqlx::query(
        "SELECT COALESCE(NULLIF(source, ''), 'Unknown') AS source,
                COUNT(*) AS total,
                SUM(CASE WHEN status = 'new' THEN 1 ELSE 0 END) AS new_count,
                SUM(CASE WHEN status = 'contacted' THEN 1 ELSE 0 END) AS contacted,
                SUM(CASE WHEN status = 'interested' THEN 1 ELSE 0 END) AS interested,
                SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END) AS closed
         FROM leads
         GROUP BY 1
         ORDER BY total DESC, source ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let total: i64 = row.try_get("total")?;
            let interested: i64 = row.try_get("interested")?;
            let closed: i64 = row.try_get("closed")?;
            Ok(SourcePerformance {
                source: row.try_get("source")?,
                total,
                new: row.try_get("new_count")?,
                contacted: row.try_get("contacted")?,
                interested,
                closed,
                conversion_rate: percentage(interested + closed, total),
            })
        })
        .collect()
}

/// One day of the analytics export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBreakdown {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Leads created that day
    pub leads_created: i64,
    /// Of which `new`
    pub new_leads: i64,
    /// Of which `contacted`
    pub contacted_leads: i64,
    /// Of which `interested`
    pub interested_leads: i64,
    /// Of which `closed`
    pub closed_leads: i64,
    /// Most frequent industry that day
    pub top_industry: Option<String>,
    /// Leads in the top industry
    pub top_industry_count: i64,
}

/// Per-day lead creation, status mix and top industry since `since`.
pub async fn daily_breakdown(
    pool: &SqlitePool,
    since: &DateTime<Utc>,
) -> Result<Vec<DailyBreakdown>> {
    let rows = sqlx::query(
        "SELECT substr(created_at, 1, 10) AS date, status, industry
         FROM leads WHERE created_at >= ?",
    )
    .bind(format_timestamp(since))
    .fetch_all(pool)
    .await?;

    let mut days: BTreeMap<String, (DailyBreakdown, HashMap<String, i64>)> = BTreeMap::new();
    for row in &rows {
        let date: String = row.try_get("date")?;
        let status: String = row.try_get("status")?;
        let industry: Option<String> = row.try_get("industry")?;

        let (day, industries) = days.entry(date.clone()).or_insert_with(|| {
            (
                DailyBreakdown {
                    date,
                    leads_created: 0,
                    new_leads: 0,
                    contacted_leads: 0,
                    interested_leads: 0,
                    closed_leads: 0,
                    top_industry: None,
                    top_industry_count: 0,
                },
                HashMap::new(),
            )
        });
        day.leads_created += 1;
        match status.as_str() {
            "new" => day.new_leads += 1,
            "contacted" => day.contacted_leads += 1,
            "interested" => day.interested_leads += 1,
            "closed" => day.closed_leads += 1,
            _ => {}
        }
        if let Some(industry) = industry.filter(|s| !s.is_empty()) {
            *industries.entry(industry).or_default() += 1;
        }
    }

    Ok(days
        .into_values()
        .map(|(mut day, industries)| {
            if let Some((name, count)) = industries
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            {
                day.top_industry = Some(name);
                day.top_industry_count = count;
            }
            day
        })
        .collect())
}
