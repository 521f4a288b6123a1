//! `/api/export`: leads, campaign results and analytics as CSV or JSON downloads.

use crate::error::{parse_id, ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use leadforge_core::TimeRange;
use leadforge_db::campaigns;
use leadforge_db::email_templates;
use leadforge_db::leads::{self, LeadFilter};
use leadforge_db::stats;
use serde::Deserialize;
use serde_json::{Map, Value};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/leads", get(export_leads))
        .route("/campaigns", get(export_campaign))
        .route("/analytics", get(export_analytics))
}

/// Download format, `csv` unless `json` is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

impl Format {
    fn parse(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Csv,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Rows under fixed column headers.
struct Table {
    headers: &'static [&'static str],
    rows: Vec<Vec<Value>>,
}

/// Quote a CSV field when it contains a comma, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Table {
    fn to_csv(&self) -> String {
        let mut out = self
            .headers
            .iter()
            .map(|h| csv_field(h))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str("\r\n");
        for row in &self.rows {
            let line = row
                .iter()
                .map(|v| csv_field(&cell_text(v)))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&line);
            out.push_str("\r\n");
        }
        out
    }

    fn to_json(&self) -> Value {
        Value::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Value> = self
                        .headers
                        .iter()
                        .map(|h| (*h).to_string())
                        .zip(row.iter().cloned())
                        .collect();
                    Value::Object(object)
                })
                .collect(),
        )
    }

    /// An attachment response named `{stem}_{date}.{ext}`.
    fn download(&self, format: Format, stem: &str) -> Response {
        let filename = format!(
            "{stem}_{}.{}",
            Utc::now().format("%Y-%m-%d"),
            format.extension()
        );
        let disposition = format!("attachment; filename=\"{filename}\"");
        match format {
            Format::Csv => (
                [
                    (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (CONTENT_DISPOSITION, disposition),
                ],
                self.to_csv(),
            )
                .into_response(),
            Format::Json => (
                [
                    (CONTENT_TYPE, "application/json".to_string()),
                    (CONTENT_DISPOSITION, disposition),
                ],
                self.to_json().to_string(),
            )
                .into_response(),
        }
    }
}

fn text(value: Option<&str>) -> Value {
    Value::String(value.unwrap_or_default().to_string())
}

fn day(at: Option<&DateTime<Utc>>) -> Value {
    Value::String(at.map(|t| t.format("%Y-%m-%d").to_string()).unwrap_or_default())
}

// ============ GET /leads ============

const LEAD_HEADERS: &[&str] = &[
    "Company Name",
    "First Name",
    "Last Name",
    "Email",
    "Phone",
    "Website",
    "Industry",
    "Status",
    "Source",
    "City",
    "State",
    "Country",
    "Address",
    "LinkedIn",
    "Created At",
    "Updated At",
];

#[derive(Debug, Default, Deserialize)]
struct LeadExportParams {
    format: Option<String>,
    industry: Option<String>,
    status: Option<String>,
    city: Option<String>,
    source: Option<String>,
}

async fn export_leads(
    State(state): State<AppState>,
    params: Result<Query<LeadExportParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let filter = LeadFilter {
        industry: params.industry,
        status: params.status,
        city: params.city,
        source: params.source,
    };
    let found = leads::find_for_export(state.db.pool(), &filter).await?;
    if found.is_empty() {
        return Err(ApiError::not_found(
            "No leads found matching the specified filters",
        ));
    }

    let rows = found
        .iter()
        .map(|lead| {
            vec![
                Value::String(lead.company_name.clone()),
                text(lead.first_name.as_deref()),
                text(lead.last_name.as_deref()),
                text(lead.email.as_deref()),
                text(lead.phone.as_deref()),
                text(lead.website.as_deref()),
                text(lead.industry.as_deref()),
                Value::String(lead.status.to_string()),
                text(lead.source.as_deref()),
                text(lead.city.as_deref()),
                text(lead.state.as_deref()),
                text(lead.country.as_deref()),
                text(lead.address.as_deref()),
                text(lead.linkedin_url.as_deref()),
                day(Some(&lead.created_at)),
                day(Some(&lead.updated_at)),
            ]
        })
        .collect();

    tracing::info!(count = found.len(), "Exporting leads");
    let table = Table {
        headers: LEAD_HEADERS,
        rows,
    };
    Ok(table.download(Format::parse(params.format.as_deref()), "leads"))
}

// ============ GET /campaigns ============

const CAMPAIGN_HEADERS: &[&str] = &[
    "Campaign Name",
    "Template",
    "Subject",
    "Company Name",
    "First Name",
    "Last Name",
    "Email",
    "Industry",
    "Status",
    "Sent At",
    "Opened",
    "Opened At",
    "IP Address",
    "User Agent",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CampaignExportParams {
    campaign_id: Option<String>,
    format: Option<String>,
}

async fn export_campaign(
    State(state): State<AppState>,
    params: Result<Query<CampaignExportParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let raw_id = params
        .campaign_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Campaign ID is required"))?;
    let campaign_id = parse_id(raw_id, "campaign")?;

    let pool = state.db.pool();
    let campaign = campaigns::get(pool, campaign_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))?;
    let template = email_templates::get(pool, campaign.template_id).await?;
    let (template_name, subject) = template
        .map(|t| (t.name, t.subject))
        .unwrap_or_default();

    let rows = campaigns::recipient_report(pool, campaign_id)
        .await?
        .into_iter()
        .map(|r| {
            let open = r.first_open.as_ref();
            vec![
                Value::String(campaign.name.clone()),
                Value::String(template_name.clone()),
                Value::String(subject.clone()),
                text(r.company_name.as_deref()),
                text(r.first_name.as_deref()),
                text(r.last_name.as_deref()),
                text(r.recipient.email.as_deref()),
                text(r.industry.as_deref()),
                Value::String(r.recipient.status.to_string()),
                day(r.recipient.sent_at.as_ref()),
                Value::String(if open.is_some() { "Yes" } else { "No" }.to_string()),
                day(open.map(|e| &e.timestamp)),
                text(open.and_then(|e| e.ip_address.as_deref())),
                text(open.and_then(|e| e.user_agent.as_deref())),
            ]
        })
        .collect();

    let table = Table {
        headers: CAMPAIGN_HEADERS,
        rows,
    };
    Ok(table.download(
        Format::parse(params.format.as_deref()),
        &format!("campaign_{campaign_id}"),
    ))
}

// ============ GET /analytics ============

const ANALYTICS_HEADERS: &[&str] = &[
    "Date",
    "Leads Created",
    "New Leads",
    "Contacted Leads",
    "Interested Leads",
    "Closed Leads",
    "Top Industry",
    "Top Industry Count",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyticsExportParams {
    time_range: Option<String>,
    format: Option<String>,
}

async fn export_analytics(
    State(state): State<AppState>,
    params: Result<Query<AnalyticsExportParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(params) = params?;
    let range = TimeRange::parse_or_default(params.time_range.as_deref());
    let since = range.start_from(Utc::now());

    let rows = stats::daily_breakdown(state.db.pool(), &since)
        .await?
        .into_iter()
        .map(|d| {
            vec![
                Value::String(d.date),
                Value::from(d.leads_created),
                Value::from(d.new_leads),
                Value::from(d.contacted_leads),
                Value::from(d.interested_leads),
                Value::from(d.closed_leads),
                Value::String(d.top_industry.unwrap_or_else(|| "N/A".to_string())),
                Value::from(d.top_industry_count),
            ]
        })
        .collect();

    let table = Table {
        headers: ANALYTICS_HEADERS,
        rows,
    };
    Ok(table.download(
        Format::parse(params.format.as_deref()),
        &format!("analytics_{range}"),
    ))
}
