//! `/api/leads`: lead CRUD, listing and breakdowns.

use super::Pagination;
use crate::error::{parse_id, ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use leadforge_db::leads::{self, Lead, LeadInput, LeadQuery};
use leadforge_db::stats::{self, GroupColumn, NameCount};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads).post(create_lead))
        .route("/stats/overview", get(overview))
        .route("/{id}", get(get_lead).put(update_lead).delete(delete_lead))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ListParams {
    page: Option<u32>,
    limit: Option<u32>,
    search: Option<String>,
    industry: Option<String>,
    status: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
}

#[derive(Serialize)]
struct LeadList {
    leads: Vec<Lead>,
    pagination: Pagination,
}

async fn list_leads(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<LeadList>> {
    let Query(params) = params?;
    let defaults = LeadQuery::default();
    let query = LeadQuery {
        page: params.page.unwrap_or(defaults.page).max(1),
        limit: params.limit.unwrap_or(defaults.limit).clamp(1, 100),
        search: params.search,
        industry: params.industry,
        status: params.status,
        sort_by: params.sort_by,
        sort_order: params.sort_order,
    };

    let page = leads::list(state.db.pool(), &query).await?;
    Ok(Json(LeadList {
        leads: page.leads,
        pagination: Pagination::new(query.page, query.limit, page.total),
    }))
}

async fn get_lead(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Lead>> {
    let id = parse_id(&id, "lead")?;
    leads::get(state.db.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Lead not found"))
}

async fn create_lead(
    State(state): State<AppState>,
    body: Result<Json<LeadInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let Json(input) = body?;
    let lead = leads::create(state.db.pool(), &input).await?;
    tracing::info!(lead_id = lead.id, "Lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<LeadInput>, JsonRejection>,
) -> ApiResult<Json<Lead>> {
    let id = parse_id(&id, "lead")?;
    let Json(patch) = body?;
    leads::update(state.db.pool(), id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Lead not found"))
}

async fn delete_lead(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "lead")?;
    if !leads::delete(state.db.pool(), id).await? {
        return Err(ApiError::not_found("Lead not found"));
    }
    Ok(Json(json!({ "message": "Lead deleted successfully" })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeadOverview {
    total_leads: i64,
    industries: Vec<NameCount>,
    statuses: Vec<NameCount>,
    cities: Vec<NameCount>,
}

async fn overview(State(state): State<AppState>) -> ApiResult<Json<LeadOverview>> {
    let pool = state.db.pool();
    Ok(Json(LeadOverview {
        total_leads: stats::count_leads(pool).await?,
        industries: stats::count_by(pool, GroupColumn::Industry, None, None).await?,
        statuses: stats::count_by(pool, GroupColumn::Status, None, None).await?,
        cities: stats::count_by(pool, GroupColumn::City, None, None).await?,
    }))
}
