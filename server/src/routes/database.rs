//! `/api/database`: connection status, table browsing, statistics and backups.

use super::Pagination;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use leadforge_db::stats::{self, GroupColumn, NameCount};
use leadforge_db::tables::{self, ColumnInfo, TableInfo, KNOWN_TABLES};
use leadforge_db::{campaigns, email_templates, smtp_credentials};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/tables", get(list_tables))
        .route("/tables/{name}/schema", get(table_schema))
        .route("/tables/{name}/data", get(table_data))
        .route("/backup", post(backup))
        .route("/stats", get(db_stats))
        .route("/health", get(health))
}

// ============ GET /status ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    status: &'static str,
    timestamp: DateTime<Utc>,
    message: &'static str,
    database: &'static str,
    schema_version: i64,
    tables: Vec<TableInfo>,
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<Status>> {
    state.db.ping().await?;
    Ok(Json(Status {
        status: "connected",
        timestamp: Utc::now(),
        message: "Database connection successful",
        database: "SQLite",
        schema_version: state.db.get_schema_version().await?,
        tables: tables::table_info(state.db.pool()).await,
    }))
}

// ============ GET /tables ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    tables: Vec<TableInfo>,
    total_tables: usize,
    available_tables: usize,
}

async fn list_tables(State(state): State<AppState>) -> Json<TableList> {
    let tables = tables::table_info(state.db.pool()).await;
    let available_tables = tables.iter().filter(|t| t.status == "available").count();
    Json(TableList {
        total_tables: tables.len(),
        available_tables,
        tables,
    })
}

// ============ GET /tables/{name}/schema ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableSchema {
    table_name: String,
    columns: Vec<ColumnInfo>,
}

async fn table_schema(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<TableSchema>> {
    let columns = tables::table_schema(state.db.pool(), &name).await?;
    Ok(Json(TableSchema {
        table_name: name,
        columns,
    }))
}

// ============ GET /tables/{name}/data ============

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DataParams {
    page: Option<u32>,
    limit: Option<u32>,
    order_by: Option<String>,
    order: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableData {
    table_name: String,
    data: Vec<Value>,
    pagination: Pagination,
}

async fn table_data(
    State(state): State<AppState>,
    Path(name): Path<String>,
    params: Result<Query<DataParams>, QueryRejection>,
) -> ApiResult<Json<TableData>> {
    let Query(params) = params?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let ascending = params
        .order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("asc"));

    let rows = tables::table_data(
        state.db.pool(),
        &name,
        page,
        limit,
        params.order_by.as_deref(),
        ascending,
    )
    .await?;
    Ok(Json(TableData {
        table_name: name,
        data: rows.rows,
        pagination: Pagination::new(page, limit, rows.total),
    }))
}

// ============ POST /backup ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Backup {
    message: &'static str,
    path: String,
    size_bytes: u64,
    timestamp: DateTime<Utc>,
}

async fn backup(State(state): State<AppState>) -> ApiResult<Json<Backup>> {
    let now = Utc::now();
    let path = state
        .backup_dir
        .join(format!("leadforge-backup-{}.db", now.format("%Y%m%d-%H%M%S")));
    let size_bytes = tables::backup_to(state.db.pool(), &path).await?;
    tracing::info!(path = %path.display(), size_bytes, "Database backup written");
    Ok(Json(Backup {
        message: "Database backup created successfully",
        path: path.display().to_string(),
        size_bytes,
        timestamp: now,
    }))
}

// ============ GET /stats ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeadTotals {
    total: i64,
    by_status: Vec<NameCount>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketingTotals {
    campaigns: i64,
    templates: i64,
    smtp_accounts: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseStats {
    leads: LeadTotals,
    email_marketing: MarketingTotals,
    known_tables: usize,
}

async fn db_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let pool = state.db.pool();
    let stats = DatabaseStats {
        leads: LeadTotals {
            total: stats::count_leads(pool).await?,
            by_status: stats::count_by(pool, GroupColumn::Status, Some("unknown"), None).await?,
        },
        email_marketing: MarketingTotals {
            campaigns: campaigns::count(pool).await?,
            templates: email_templates::count(pool).await?,
            smtp_accounts: smtp_credentials::list(pool).await?.len(),
        },
        known_tables: KNOWN_TABLES.len(),
    };
    Ok(Json(json!({ "timestamp": Utc::now(), "stats": stats })))
}

// ============ GET /health ============

async fn health(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let result = state.db.ping().await;
    let response_time = format!("{}ms", started.elapsed().as_millis());

    match result {
        Ok(()) => Json(json!({
            "status": "healthy",
            "timestamp": Utc::now(),
            "responseTime": response_time,
            "database": "SQLite",
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                "Database health check failed",
            )
            .with_details(json!({ "responseTime": response_time }))
            .into_response()
        }
    }
}
