//! Database administration: table inventory, schemas, raw rows and backups.
//!
//! Table names come from a fixed whitelist; anything else is reported as not
//! found before any SQL is built.

use crate::error::{DatabaseError, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Tables exposed through the admin API.
pub const KNOWN_TABLES: [&str; 10] = [
    "leads",
    "lead_emails",
    "prospecting_jobs",
    "scraping_jobs",
    "smtp_credentials",
    "email_templates",
    "email_campaigns",
    "campaign_recipients",
    "email_tracking",
    "settings",
];

/// Resolve a user-supplied table name against [`KNOWN_TABLES`].
pub fn known_table(name: &str) -> Result<&'static str> {
    KNOWN_TABLES
        .iter()
        .copied()
        .find(|t| *t == name)
        .ok_or_else(|| {
            DatabaseError::NotFoundWithMessage(format!("Table {name} not found or inaccessible"))
        })
}

/// Availability and size of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Table name
    pub name: String,
    /// `available` or `error`
    pub status: String,
    /// Rows in the table
    pub record_count: i64,
    /// Query error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Row counts for every known table. A failing table is reported, not fatal.
pub async fn table_info(pool: &SqlitePool) -> Vec<TableInfo> {
    let mut info = Vec::with_capacity(KNOWN_TABLES.len());
    for name in KNOWN_TABLES {
        let result: std::result::Result<i64, sqlx::Error> =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
                .fetch_one(pool)
                .await;
        info.push(match result {
            Ok(count) => TableInfo {
                name: name.to_string(),
                status: "available".to_string(),
                record_count: count,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Failed to count rows in {}: {}", name, e);
                TableInfo {
                    name: name.to_string(),
                    status: "error".to_string(),
                    record_count: 0,
                    error: Some(e.to_string()),
                }
            }
        });
    }
    info
}

/// A column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub column_type: String,
    /// Accepts NULL
    pub nullable: bool,
    /// Default expression
    pub default_value: Option<String>,
    /// Part of the primary key
    pub primary_key: bool,
}

/// Column schema of a known table.
pub async fn table_schema(pool: &SqlitePool, name: &str) -> Result<Vec<ColumnInfo>> {
    let table = known_table(name)?;
    let rows = sqlx::query(
        "SELECT name, type, \"notnull\" AS not_null, dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let not_null: i64 = row.try_get("not_null")?;
            let pk: i64 = row.try_get("pk")?;
            Ok(ColumnInfo {
                name: row.try_get("name")?,
                column_type: row.try_get("type")?,
                nullable: not_null == 0,
                default_value: row.try_get("dflt_value")?,
                primary_key: pk > 0,
            })
        })
        .collect()
}

/// A page of raw table rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    /// Rows as JSON objects
    pub rows: Vec<JsonValue>,
    /// Total rows in the table
    pub total: i64,
}

/// Page through a known table's rows as JSON objects.
///
/// `order_by` must name one of the table's columns; anything else sorts by
/// the first column.
pub async fn table_data(
    pool: &SqlitePool,
    name: &str,
    page: u32,
    limit: u32,
    order_by: Option<&str>,
    ascending: bool,
) -> Result<TablePage> {
    let table = known_table(name)?;
    let columns = table_schema(pool, table).await?;
    let Some(first) = columns.first() else {
        return Ok(TablePage {
            rows: Vec::new(),
            total: 0,
        });
    };

    let order_col = order_by
        .and_then(|o| columns.iter().find(|c| c.name == o))
        .unwrap_or(first);
    let object = columns
        .iter()
        .map(|c| format!("'{0}', \"{0}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let limit = i64::from(limit.clamp(1, 500));
    let offset = i64::from(page.max(1) - 1) * limit;
    let direction = if ascending { "ASC" } else { "DESC" };

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await?;
    let raw: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT json_object({object}) FROM {table} ORDER BY \"{}\" {direction} LIMIT {limit} OFFSET {offset}",
        order_col.name
    ))
    .fetch_all(pool)
    .await?;

    let rows = raw
        .iter()
        .map(|s| serde_json::from_str(s))
        .collect::<std::result::Result<Vec<JsonValue>, _>>()?;
    Ok(TablePage { rows, total })
}

/// Write a consistent copy of the database to `path` with `VACUUM INTO`.
///
/// # Errors
/// Fails if `path` already exists or is not writable.
pub async fn backup_to(pool: &SqlitePool, path: &Path) -> Result<u64> {
    if path.exists() {
        return Err(DatabaseError::Invalid(format!(
            "backup target {} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let target = path
        .to_str()
        .ok_or_else(|| DatabaseError::Invalid("backup path is not valid UTF-8".to_string()))?;

    sqlx::query("VACUUM INTO ?").bind(target).execute(pool).await?;

    let size = std::fs::metadata(path)?.len();
    tracing::info!("Database backup written to {} ({} bytes)", target, size);
    Ok(size)
}
