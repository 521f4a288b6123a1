//! `/api/dashboard`: headline numbers and chart data.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use leadforge_core::{LeadStatus, TimeRange};
use leadforge_db::leads::Lead;
use leadforge_db::stats::{self, DateCount, GroupColumn, NameCount};
use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "unknown";
const RECENT_LEADS: u32 = 5;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/overview", get(overview))
        .route("/charts", get(charts))
        .route("/quick-actions", get(quick_actions))
}

#[derive(Debug, Serialize)]
struct StatusCount {
    status: String,
    count: i64,
}

#[derive(Debug, Serialize)]
struct IndustryCount {
    industry: String,
    count: i64,
}

fn by_status(counts: Vec<NameCount>) -> Vec<StatusCount> {
    counts
        .into_iter()
        .map(|c| StatusCount {
            status: c.name,
            count: c.count,
        })
        .collect()
}

fn by_industry(counts: Vec<NameCount>) -> Vec<IndustryCount> {
    counts
        .into_iter()
        .map(|c| IndustryCount {
            industry: c.name,
            count: c.count,
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Overview {
    total_leads: i64,
    status_distribution: Vec<StatusCount>,
    industry_distribution: Vec<IndustryCount>,
    recent_leads: Vec<Lead>,
}

async fn overview(State(state): State<AppState>) -> ApiResult<Json<Overview>> {
    let pool = state.db.pool();
    Ok(Json(Overview {
        total_leads: stats::count_leads(pool).await?,
        status_distribution: by_status(
            stats::count_by(pool, GroupColumn::Status, Some(UNKNOWN), None).await?,
        ),
        industry_distribution: by_industry(
            stats::count_by(pool, GroupColumn::Industry, Some(UNKNOWN), None).await?,
        ),
        recent_leads: stats::recent_leads(pool, RECENT_LEADS).await?,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeParams {
    time_range: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Charts {
    daily_leads: Vec<DateCount>,
    status_breakdown: Vec<StatusCount>,
    industry_breakdown: Vec<IndustryCount>,
}

async fn charts(
    State(state): State<AppState>,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> ApiResult<Json<Charts>> {
    let Query(params) = params?;
    let range = TimeRange::parse_or_default(params.time_range.as_deref());
    let since = range.start_from(Utc::now());
    let pool = state.db.pool();

    Ok(Json(Charts {
        daily_leads: stats::daily_counts_since(pool, &since).await?,
        status_breakdown: by_status(
            stats::count_by(pool, GroupColumn::Status, Some(UNKNOWN), Some(&since)).await?,
        ),
        industry_breakdown: by_industry(
            stats::count_by(pool, GroupColumn::Industry, Some(UNKNOWN), Some(&since)).await?,
        ),
    }))
}

#[derive(Serialize)]
struct QuickAction {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    action: &'static str,
    target: &'static str,
}

const ACTIONS: [QuickAction; 3] = [
    QuickAction {
        id: "add-lead",
        title: "Add New Lead",
        description: "Add a new business contact",
        action: "navigate",
        target: "/leads/new",
    },
    QuickAction {
        id: "export-leads",
        title: "Export Leads",
        description: "Export leads to CSV or JSON",
        action: "navigate",
        target: "/export",
    },
    QuickAction {
        id: "email-campaign",
        title: "Create Campaign",
        description: "Start an email marketing campaign",
        action: "navigate",
        target: "/email-marketing",
    },
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuickActions {
    new_leads: i64,
    contacted_leads: i64,
    interested_leads: i64,
    actions: &'static [QuickAction],
}

async fn quick_actions(State(state): State<AppState>) -> ApiResult<Json<QuickActions>> {
    let pool = state.db.pool();
    Ok(Json(QuickActions {
        new_leads: stats::count_with_status(pool, LeadStatus::New.as_str()).await?,
        contacted_leads: stats::count_with_status(pool, LeadStatus::Contacted.as_str()).await?,
        interested_leads: stats::count_with_status(pool, LeadStatus::Interested.as_str()).await?,
        actions: &ACTIONS,
    }))
}
