//! Lead storage: CRUD, listing, prospecting search and deduplicating upsert.
//!
//! Leads created by hand have no `dedup_key`. Leads written by the
//! prospecting and scraping pipelines carry `lower(company)|lower(website)`
//! so repeated runs update the same row instead of duplicating it.

use crate::error::{DatabaseError, Result};
use crate::{format_timestamp, now_string, parse_optional_timestamp, parse_timestamp, Filter};
use chrono::{DateTime, Utc};
use leadforge_core::{LeadStatus, Priority};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row, Sqlite, SqlitePool};

/// A stored business contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Row id
    pub id: i64,
    /// Company name (always present)
    pub company_name: String,
    /// Contact first name
    pub first_name: Option<String>,
    /// Contact last name
    pub last_name: Option<String>,
    /// Primary email address
    pub email: Option<String>,
    /// Contact job title
    pub title: Option<String>,
    /// Industry label
    pub industry: Option<String>,
    /// Company website
    pub website: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or region
    pub state: Option<String>,
    /// Country
    pub country: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// Team size bucket, e.g. `11-50`
    pub team_size: Option<String>,
    /// Revenue bucket
    pub revenue_range: Option<String>,
    /// Total funding raised
    pub total_funding: Option<String>,
    /// Year founded
    pub founded_year: Option<i64>,
    /// Employee headcount
    pub employee_count: Option<i64>,
    /// Free-form description
    pub description: Option<String>,
    /// Comma-separated keywords
    pub keywords: Option<String>,
    /// Where the lead came from (`manual`, `google_maps`, `prospecting_search`, ...)
    pub source: Option<String>,
    /// Completeness score in `0.0..=1.0`
    pub quality_score: Option<f64>,
    /// Guessed email patterns for the company domain
    pub email_patterns: Vec<String>,
    /// Website host without `www.`
    pub domain: Option<String>,
    /// Highest scoring generated email
    pub best_email: Option<String>,
    /// Number of generated emails stored for this lead
    pub email_count: i64,
    /// LinkedIn profile URL
    pub linkedin_url: Option<String>,
    /// Twitter profile URL
    pub twitter_url: Option<String>,
    /// Facebook page URL
    pub facebook_url: Option<String>,
    /// Pipeline status
    pub status: LeadStatus,
    /// Follow-up priority
    pub priority: Priority,
    /// Owner
    pub assigned_to: Option<String>,
    /// Prospecting job that last produced this lead
    pub prospecting_job_id: Option<i64>,
    /// When the lead was scraped
    pub scraped_at: Option<DateTime<Utc>>,
    /// When enrichment last ran
    pub enriched_at: Option<DateTime<Utc>>,
    /// Last outreach
    pub last_contacted_at: Option<DateTime<Utc>>,
    /// Number of outreach attempts
    pub contact_count: i64,
    /// Manually verified
    pub is_verified: bool,
    /// When verification happened
    pub verification_date: Option<DateTime<Utc>>,
    /// Deduplication identity (pipeline-written leads only)
    pub dedup_key: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Writable lead fields. Used for create (where `company_name` is required)
/// and as a partial patch for update, where `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct LeadInput {
    pub company_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub team_size: Option<String>,
    pub revenue_range: Option<String>,
    pub total_funding: Option<String>,
    pub founded_year: Option<i64>,
    pub employee_count: Option<i64>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub source: Option<String>,
    pub quality_score: Option<f64>,
    pub email_patterns: Option<Vec<String>>,
    pub domain: Option<String>,
    pub best_email: Option<String>,
    pub email_count: Option<i64>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub status: Option<LeadStatus>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<String>,
    pub prospecting_job_id: Option<i64>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub contact_count: Option<i64>,
    pub is_verified: Option<bool>,
    pub verification_date: Option<DateTime<Utc>>,
}

impl From<&Lead> for LeadInput {
    fn from(lead: &Lead) -> Self {
        Self {
            company_name: Some(lead.company_name.clone()),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            title: lead.title.clone(),
            industry: lead.industry.clone(),
            website: lead.website.clone(),
            phone: lead.phone.clone(),
            address: lead.address.clone(),
            city: lead.city.clone(),
            state: lead.state.clone(),
            country: lead.country.clone(),
            postal_code: lead.postal_code.clone(),
            team_size: lead.team_size.clone(),
            revenue_range: lead.revenue_range.clone(),
            total_funding: lead.total_funding.clone(),
            founded_year: lead.founded_year,
            employee_count: lead.employee_count,
            description: lead.description.clone(),
            keywords: lead.keywords.clone(),
            source: lead.source.clone(),
            quality_score: lead.quality_score,
            email_patterns: Some(lead.email_patterns.clone()),
            domain: lead.domain.clone(),
            best_email: lead.best_email.clone(),
            email_count: Some(lead.email_count),
            linkedin_url: lead.linkedin_url.clone(),
            twitter_url: lead.twitter_url.clone(),
            facebook_url: lead.facebook_url.clone(),
            status: Some(lead.status),
            priority: Some(lead.priority),
            assigned_to: lead.assigned_to.clone(),
            prospecting_job_id: lead.prospecting_job_id,
            scraped_at: lead.scraped_at,
            enriched_at: lead.enriched_at,
            last_contacted_at: lead.last_contacted_at,
            contact_count: Some(lead.contact_count),
            is_verified: Some(lead.is_verified),
            verification_date: lead.verification_date,
        }
    }
}

macro_rules! patch_optional {
    ($lead:ident, $input:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(v) = &$input.$field {
                $lead.$field = Some(v.clone());
            }
        )+
    };
}

impl Lead {
    fn from_input(input: &LeadInput, now: DateTime<Utc>) -> Result<Self> {
        let company_name = input
            .company_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DatabaseError::Invalid("company_name is required".to_string()))?
            .to_string();

        let mut lead = Self {
            id: 0,
            company_name,
            first_name: None,
            last_name: None,
            email: None,
            title: None,
            industry: None,
            website: None,
            phone: None,
            address: None,
            city: None,
            state: None,
            country: None,
            postal_code: None,
            team_size: None,
            revenue_range: None,
            total_funding: None,
            founded_year: None,
            employee_count: None,
            description: None,
            keywords: None,
            source: None,
            quality_score: None,
            email_patterns: Vec::new(),
            domain: None,
            best_email: None,
            email_count: 0,
            linkedin_url: None,
            twitter_url: None,
            facebook_url: None,
            status: LeadStatus::New,
            priority: Priority::Medium,
            assigned_to: None,
            prospecting_job_id: None,
            scraped_at: None,
            enriched_at: None,
            last_contacted_at: None,
            contact_count: 0,
            is_verified: false,
            verification_date: None,
            dedup_key: None,
            created_at: now,
            updated_at: now,
        };
        lead.apply(input);
        Ok(lead)
    }

    /// Apply a partial patch. Fields that are `None` in `patch` are kept.
    pub fn apply(&mut self, patch: &LeadInput) {
        if let Some(name) = patch.company_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                self.company_name = name.to_string();
            }
        }
        patch_optional!(
            self,
            patch,
            first_name,
            last_name,
            email,
            title,
            industry,
            website,
            phone,
            address,
            city,
            state,
            country,
            postal_code,
            team_size,
            revenue_range,
            total_funding,
            founded_year,
            employee_count,
            description,
            keywords,
            source,
            quality_score,
            domain,
            best_email,
            linkedin_url,
            twitter_url,
            facebook_url,
            assigned_to,
            prospecting_job_id,
            scraped_at,
            enriched_at,
            last_contacted_at,
            verification_date,
        );
        if let Some(patterns) = &patch.email_patterns {
            self.email_patterns.clone_from(patterns);
        }
        if let Some(n) = patch.email_count {
            self.email_count = n;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(n) = patch.contact_count {
            self.contact_count = n;
        }
        if let Some(v) = patch.is_verified {
            self.is_verified = v;
        }
    }

    /// Contact display name, if any part is known.
    #[must_use]
    pub fn contact_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Normalised identity used to merge pipeline leads: `lower(company)|lower(website)`.
#[must_use]
pub fn dedup_key(company_name: &str, website: Option<&str>) -> String {
    format!(
        "{}|{}",
        company_name.trim().to_lowercase(),
        website.unwrap_or_default().trim().to_lowercase()
    )
}

const WRITABLE_COLUMNS: [&str; 39] = [
    "company_name",
    "first_name",
    "last_name",
    "email",
    "title",
    "industry",
    "website",
    "phone",
    "address",
    "city",
    "state",
    "country",
    "postal_code",
    "team_size",
    "revenue_range",
    "total_funding",
    "founded_year",
    "employee_count",
    "description",
    "keywords",
    "source",
    "quality_score",
    "email_patterns",
    "domain",
    "best_email",
    "email_count",
    "linkedin_url",
    "twitter_url",
    "facebook_url",
    "status",
    "priority",
    "assigned_to",
    "prospecting_job_id",
    "scraped_at",
    "enriched_at",
    "last_contacted_at",
    "contact_count",
    "is_verified",
    "verification_date",
];

/// Columns an upsert must not overwrite on an existing row.
const UPSERT_KEEP: [&str; 5] = [
    "status",
    "priority",
    "assigned_to",
    "contact_count",
    "is_verified",
];

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_writable<'q>(query: SqliteQuery<'q>, lead: &Lead) -> Result<SqliteQuery<'q>> {
    let patterns = serde_json::to_string(&lead.email_patterns)?;
    let ts = |t: Option<DateTime<Utc>>| t.as_ref().map(format_timestamp);
    Ok(query
        .bind(lead.company_name.clone())
        .bind(lead.first_name.clone())
        .bind(lead.last_name.clone())
        .bind(lead.email.clone())
        .bind(lead.title.clone())
        .bind(lead.industry.clone())
        .bind(lead.website.clone())
        .bind(lead.phone.clone())
        .bind(lead.address.clone())
        .bind(lead.city.clone())
        .bind(lead.state.clone())
        .bind(lead.country.clone())
        .bind(lead.postal_code.clone())
        .bind(lead.team_size.clone())
        .bind(lead.revenue_range.clone())
        .bind(lead.total_funding.clone())
        .bind(lead.founded_year)
        .bind(lead.employee_count)
        .bind(lead.description.clone())
        .bind(lead.keywords.clone())
        .bind(lead.source.clone())
        .bind(lead.quality_score)
        .bind(patterns)
        .bind(lead.domain.clone())
        .bind(lead.best_email.clone())
        .bind(lead.email_count)
        .bind(lead.linkedin_url.clone())
        .bind(lead.twitter_url.clone())
        .bind(lead.facebook_url.clone())
        .bind(lead.status.to_string())
        .bind(lead.priority.to_string())
        .bind(lead.assigned_to.clone())
        .bind(lead.prospecting_job_id)
        .bind(ts(lead.scraped_at))
        .bind(ts(lead.enriched_at))
        .bind(ts(lead.last_contacted_at))
        .bind(lead.contact_count)
        .bind(lead.is_verified)
        .bind(ts(lead.verification_date)))
}

fn insert_sql(on_conflict: &str) -> String {
    let placeholders = vec!["?"; WRITABLE_COLUMNS.len() + 3].join(", ");
    format!(
        "INSERT INTO leads ({}, dedup_key, created_at, updated_at) VALUES ({placeholders}){on_conflict}",
        WRITABLE_COLUMNS.join(", ")
    )
}

pub(crate) fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let patterns: String = row.try_get("email_patterns")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Lead {
        id: row.try_get("id")?,
        company_name: row.try_get("company_name")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        title: row.try_get("title")?,
        industry: row.try_get("industry")?,
        website: row.try_get("website")?,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        country: row.try_get("country")?,
        postal_code: row.try_get("postal_code")?,
        team_size: row.try_get("team_size")?,
        revenue_range: row.try_get("revenue_range")?,
        total_funding: row.try_get("total_funding")?,
        founded_year: row.try_get("founded_year")?,
        employee_count: row.try_get("employee_count")?,
        description: row.try_get("description")?,
        keywords: row.try_get("keywords")?,
        source: row.try_get("source")?,
        quality_score: row.try_get("quality_score")?,
        email_patterns: serde_json::from_str(&patterns).unwrap_or_default(),
        domain: row.try_get("domain")?,
        best_email: row.try_get("best_email")?,
        email_count: row.try_get("email_count")?,
        linkedin_url: row.try_get("linkedin_url")?,
        twitter_url: row.try_get("twitter_url")?,
        facebook_url: row.try_get("facebook_url")?,
        status: LeadStatus::parse(&status),
        priority: Priority::parse(&priority),
        assigned_to: row.try_get("assigned_to")?,
        prospecting_job_id: row.try_get("prospecting_job_id")?,
        scraped_at: parse_optional_timestamp(row.try_get("scraped_at")?)?,
        enriched_at: parse_optional_timestamp(row.try_get("enriched_at")?)?,
        last_contacted_at: parse_optional_timestamp(row.try_get("last_contacted_at")?)?,
        contact_count: row.try_get("contact_count")?,
        is_verified: row.try_get("is_verified")?,
        verification_date: parse_optional_timestamp(row.try_get("verification_date")?)?,
        dedup_key: row.try_get("dedup_key")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn leads_from_rows(rows: &[SqliteRow]) -> Result<Vec<Lead>> {
    rows.iter().map(lead_from_row).collect()
}

/// Create a lead by hand. `company_name` is required.
pub async fn create(pool: &SqlitePool, input: &LeadInput) -> Result<Lead> {
    let now = Utc::now();
    let lead = Lead::from_input(input, now)?;
    let sql = insert_sql("");

    let result = bind_writable(sqlx::query(&sql), &lead)?
        .bind(Option::<String>::None)
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(pool)
        .await?;

    let id = result.last_insert_rowid();
    tracing::debug!(lead_id = id, company = %lead.company_name, "Lead created");
    get(pool, id).await?.ok_or(DatabaseError::NotFound)
}

/// Fetch a single lead.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Lead>> {
    let row = sqlx::query("SELECT * FROM leads WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(lead_from_row).transpose()
}

/// Apply a partial patch and bump `updated_at`. Returns `None` when the lead
/// does not exist.
pub async fn update(pool: &SqlitePool, id: i64, patch: &LeadInput) -> Result<Option<Lead>> {
    let Some(mut lead) = get(pool, id).await? else {
        return Ok(None);
    };
    lead.apply(patch);
    lead.updated_at = Utc::now();

    let assignments = WRITABLE_COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE leads SET {assignments}, updated_at = ? WHERE id = ?");

    bind_writable(sqlx::query(&sql), &lead)?
        .bind(format_timestamp(&lead.updated_at))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(Some(lead))
}

/// Delete a lead. Returns whether a row was removed.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert a pipeline lead, or merge it into the row with the same dedup key.
///
/// On conflict, non-null incoming values replace stored ones; workflow fields
/// (status, priority, owner, contact count, verification) are preserved.
pub async fn upsert(pool: &SqlitePool, input: &LeadInput) -> Result<Lead> {
    let now = Utc::now();
    let mut lead = Lead::from_input(input, now)?;
    let key = dedup_key(&lead.company_name, lead.website.as_deref());
    lead.dedup_key = Some(key.clone());

    let updates = WRITABLE_COLUMNS
        .iter()
        .filter(|c| !UPSERT_KEEP.contains(c))
        .map(|c| match *c {
            "email_patterns" | "email_count" | "company_name" => format!("{c} = excluded.{c}"),
            _ => format!("{c} = COALESCE(excluded.{c}, leads.{c})"),
        })
        .collect::<Vec<_>>()
        .join(", ");
    let sql = insert_sql(&format!(
        " ON CONFLICT(dedup_key) DO UPDATE SET {updates}, updated_at = excluded.updated_at"
    ));

    bind_writable(sqlx::query(&sql), &lead)?
        .bind(&key)
        .bind(format_timestamp(&now))
        .bind(format_timestamp(&now))
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT * FROM leads WHERE dedup_key = ?")
        .bind(&key)
        .fetch_one(pool)
        .await?;
    lead_from_row(&row)
}

/// Sortable columns accepted by [`list`].
pub const SORTABLE_COLUMNS: [&str; 11] = [
    "company_name",
    "first_name",
    "last_name",
    "email",
    "industry",
    "status",
    "city",
    "source",
    "quality_score",
    "created_at",
    "updated_at",
];

/// Parameters for [`list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadQuery {
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Matched against company, first and last name
    pub search: Option<String>,
    /// Exact industry
    pub industry: Option<String>,
    /// Exact status
    pub status: Option<String>,
    /// Sort column; anything outside [`SORTABLE_COLUMNS`] falls back to `created_at`
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default)
    pub sort_order: Option<String>,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            industry: None,
            status: None,
            sort_by: None,
            sort_order: None,
        }
    }
}

/// One page of leads plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct LeadPage {
    /// Leads on this page
    pub leads: Vec<Lead>,
    /// Total matching leads
    pub total: i64,
}

/// List leads with search, filters, sorting and pagination.
pub async fn list(pool: &SqlitePool, query: &LeadQuery) -> Result<LeadPage> {
    let mut filter = Filter::default();
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        filter.push(
            "(company_name LIKE ? OR first_name LIKE ? OR last_name LIKE ?)",
            [pattern.clone(), pattern.clone(), pattern],
        );
    }
    filter.eq("industry", query.industry.as_deref());
    filter.eq("status", query.status.as_deref());

    let sort_by = query
        .sort_by
        .as_deref()
        .filter(|c| SORTABLE_COLUMNS.contains(c))
        .unwrap_or("created_at");
    let order = match query.sort_order.as_deref() {
        Some(o) if o.eq_ignore_ascii_case("asc") => "ASC",
        _ => "DESC",
    };
    let limit = i64::from(query.limit.clamp(1, 1000));
    let offset = i64::from(query.page.max(1) - 1) * limit;

    let count_sql = format!("SELECT COUNT(*) FROM leads{}", filter.sql());
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in filter.args() {
        count_query = count_query.bind(arg);
    }
    let total = count_query.fetch_one(pool).await?;

    let sql = format!(
        "SELECT * FROM leads{} ORDER BY {sort_by} {order}, id {order} LIMIT {limit} OFFSET {offset}",
        filter.sql()
    );
    let mut rows_query = sqlx::query(&sql);
    for arg in filter.args() {
        rows_query = rows_query.bind(arg);
    }
    let rows = rows_query.fetch_all(pool).await?;

    Ok(LeadPage {
        leads: leads_from_rows(&rows)?,
        total,
    })
}

/// Criteria for searching existing leads during prospecting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadSearch {
    /// `LIKE` on title
    pub title: Option<String>,
    /// `LIKE` on company name or website
    pub company: Option<String>,
    /// Exact industry
    pub industry: Option<String>,
    /// Exact team size bucket
    pub team_size: Option<String>,
    /// Exact revenue bucket
    pub revenue_range: Option<String>,
    /// Exact funding label
    pub total_funding: Option<String>,
    /// `LIKE` on city, state or country
    pub location: Option<String>,
    /// Maximum rows
    pub limit: u32,
}

/// Search stored leads by prospecting criteria.
pub async fn search_by_criteria(pool: &SqlitePool, search: &LeadSearch) -> Result<Vec<Lead>> {
    let mut filter = Filter::default();
    if let Some(title) = search.title.as_deref().filter(|s| !s.is_empty()) {
        filter.push("title LIKE ?", [format!("%{title}%")]);
    }
    if let Some(company) = search.company.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{company}%");
        filter.push("(company_name LIKE ? OR website LIKE ?)", [pattern.clone(), pattern]);
    }
    filter.eq("industry", search.industry.as_deref());
    filter.eq("team_size", search.team_size.as_deref());
    filter.eq("revenue_range", search.revenue_range.as_deref());
    filter.eq("total_funding", search.total_funding.as_deref());
    if let Some(location) = search.location.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{location}%");
        filter.push(
            "(city LIKE ? OR state LIKE ? OR country LIKE ?)",
            [pattern.clone(), pattern.clone(), pattern],
        );
    }

    let sql = format!(
        "SELECT * FROM leads{} ORDER BY created_at DESC LIMIT {}",
        filter.sql(),
        search.limit.max(1)
    );
    let mut query = sqlx::query(&sql);
    for arg in filter.args() {
        query = query.bind(arg);
    }
    let rows = query.fetch_all(pool).await?;
    leads_from_rows(&rows)
}

/// Equality filters shared by export and campaign targeting. Empty strings are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFilter {
    /// Exact industry
    pub industry: Option<String>,
    /// Exact status
    pub status: Option<String>,
    /// Exact city
    pub city: Option<String>,
    /// Exact source
    pub source: Option<String>,
}

impl LeadFilter {
    fn to_filter(&self) -> Filter {
        let mut filter = Filter::default();
        filter.eq("industry", self.industry.as_deref());
        filter.eq("status", self.status.as_deref());
        filter.eq("city", self.city.as_deref());
        filter.eq("source", self.source.as_deref());
        filter
    }
}

async fn find_matching(pool: &SqlitePool, filter: &LeadFilter, order: &str) -> Result<Vec<Lead>> {
    let filter = filter.to_filter();
    let sql = format!("SELECT * FROM leads{} ORDER BY {order}", filter.sql());
    let mut query = sqlx::query(&sql);
    for arg in filter.args() {
        query = query.bind(arg);
    }
    let rows = query.fetch_all(pool).await?;
    leads_from_rows(&rows)
}

/// Leads to export, newest first.
pub async fn find_for_export(pool: &SqlitePool, filter: &LeadFilter) -> Result<Vec<Lead>> {
    find_matching(pool, filter, "created_at DESC, id DESC").await
}

/// Leads targeted by a campaign, in insertion order.
pub async fn find_for_campaign(pool: &SqlitePool, filter: &LeadFilter) -> Result<Vec<Lead>> {
    find_matching(pool, filter, "id ASC").await
}

/// Leads stored by a prospecting job, best quality first.
pub async fn list_by_job(pool: &SqlitePool, job_id: i64) -> Result<Vec<Lead>> {
    let rows = sqlx::query(
        "SELECT * FROM leads WHERE prospecting_job_id = ?
         ORDER BY quality_score DESC, id ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;
    leads_from_rows(&rows)
}

/// Number of leads stored by a prospecting job.
pub async fn count_by_job(pool: &SqlitePool, job_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE prospecting_job_id = ?")
        .bind(job_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Record an outreach attempt.
pub async fn mark_contacted(pool: &SqlitePool, id: i64) -> Result<()> {
    let now = now_string();
    sqlx::query(
        "UPDATE leads
         SET status = CASE WHEN status = 'new' THEN 'contacted' ELSE status END,
             contact_count = contact_count + 1,
             last_contacted_at = ?,
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
