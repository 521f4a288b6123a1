//! Key-value settings storage.
//!
//! Values are stored as JSON so each settings section can evolve without
//! schema changes.

use crate::error::Result;
use crate::{now_string, parse_timestamp};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Set a setting, returning the stored `updated_at`.
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &Value) -> Result<DateTime<Utc>> {
    let value_str = serde_json::to_string(value)?;
    let now = now_string();

    sqlx::query(
        r"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        ",
    )
    .bind(key)
    .bind(value_str)
    .bind(&now)
    .execute(pool)
    .await?;

    parse_timestamp(&now)
}

/// Get a setting.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<Value>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((value_str,)) => Ok(Some(serde_json::from_str(&value_str)?)),
        None => Ok(None),
    }
}

/// All settings keyed by name.
pub async fn get_all(pool: &SqlitePool) -> Result<HashMap<String, Value>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|(key, value)| Ok((key, serde_json::from_str(&value)?)))
        .collect()
}

/// Delete a setting.
pub async fn delete_setting(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}
