//! `/api/analytics`: totals, growth and breakdowns.

use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use leadforge_core::TimeRange;
use leadforge_db::stats::{self, GroupColumn, GrowthPeriod, NameCount, PeriodCount, SourcePerformance};
use leadforge_db::lead_emails;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const TOP_LOCATIONS: usize = 20;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(summary))
        .route("/growth", get(growth))
        .route("/industries", get(industries))
        .route("/statuses", get(statuses))
        .route("/geography", get(geography))
        .route("/sources", get(sources))
}

/// `[{<key>: name, count}]`, keeping the order of `counts`.
fn keyed(key: &str, counts: Vec<NameCount>) -> Vec<Value> {
    counts
        .into_iter()
        .map(|c| {
            let mut entry = Map::new();
            entry.insert(key.to_string(), Value::String(c.name));
            entry.insert("count".to_string(), Value::from(c.count));
            Value::Object(entry)
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryParams {
    time_range: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    total_leads: i64,
    total_emails: i64,
    total_companies: i64,
    time_range: TimeRange,
}

async fn summary(
    State(state): State<AppState>,
    params: Result<Query<SummaryParams>, QueryRejection>,
) -> ApiResult<Json<Summary>> {
    let Query(params) = params?;
    let pool = state.db.pool();
    Ok(Json(Summary {
        total_leads: stats::count_leads(pool).await?,
        total_emails: lead_emails::count(pool).await?,
        total_companies: stats::unique_companies(pool).await?,
        time_range: TimeRange::parse_or_default(params.time_range.as_deref()),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct GrowthParams {
    period: Option<String>,
}

#[derive(Serialize)]
struct Growth {
    period: String,
    data: Vec<PeriodCount>,
}

/// Lead creation over the last year, bucketed by `period`.
async fn growth(
    State(state): State<AppState>,
    params: Result<Query<GrowthParams>, QueryRejection>,
) -> ApiResult<Json<Growth>> {
    let Query(params) = params?;
    let period = params.period.unwrap_or_else(|| "monthly".to_string());
    let since = TimeRange::Year.start_from(Utc::now());
    let data = stats::growth(state.db.pool(), GrowthPeriod::parse(&period), &since).await?;
    Ok(Json(Growth { period, data }))
}

async fn industries(State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    let counts = stats::count_by(state.db.pool(), GroupColumn::Industry, Some("Unknown"), None).await?;
    Ok(Json(keyed("industry", counts)))
}

async fn statuses(State(state): State<AppState>) -> ApiResult<Json<Vec<Value>>> {
    let counts = stats::count_by(state.db.pool(), GroupColumn::Status, Some("Unknown"), None).await?;
    Ok(Json(keyed("status", counts)))
}

#[derive(Serialize)]
struct Geography {
    cities: Vec<Value>,
    states: Vec<Value>,
    countries: Vec<Value>,
}

async fn geography(State(state): State<AppState>) -> ApiResult<Json<Geography>> {
    let pool = state.db.pool();
    let top = |key: &str, mut counts: Vec<NameCount>| {
        counts.truncate(TOP_LOCATIONS);
        keyed(key, counts)
    };
    Ok(Json(Geography {
        cities: top("city", stats::count_by(pool, GroupColumn::City, None, None).await?),
        states: top("state", stats::count_by(pool, GroupColumn::State, None, None).await?),
        countries: top(
            "country",
            stats::count_by(pool, GroupColumn::Country, None, None).await?,
        ),
    }))
}

async fn sources(State(state): State<AppState>) -> ApiResult<Json<Vec<SourcePerformance>>> {
    Ok(Json(stats::source_performance(state.db.pool()).await?))
}
