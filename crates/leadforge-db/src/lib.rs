//! LeadForge Database Layer
//!
//! Provides `SQLite` access for leads, prospecting jobs, scraping jobs and
//! email marketing data. Uses `SQLx` with embedded migrations.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Connection Pooling**: configurable pool (default 5 connections)
//! - **Queries**: free async functions taking `&SqlitePool`, one module per table
//! - **Timestamps**: stored as fixed-width RFC3339 strings so they sort lexically
//!
//! # Example
//!
//! ```ignore
//! use leadforge_db::{Database, leads};
//!
//! let db = Database::new("leadforge.db").await?;
//! db.run_migrations().await?;
//! let page = leads::list(db.pool(), &leads::LeadQuery::default()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod campaigns;
pub mod connection;
pub mod email_templates;
pub mod error;
pub mod lead_emails;
pub mod leads;
pub mod migrations;
pub mod prospecting_jobs;
pub mod scraping_jobs;
pub mod settings;
pub mod smtp_credentials;
pub mod stats;
pub mod tables;

pub use error::{DatabaseError, Result};

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::path::Path;

/// High-level database handle.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `path` with the default pool size.
    ///
    /// Use `:memory:` for an in-memory database.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_connections(path, 5).await
    }

    /// Open (or create) the database with an explicit pool size.
    pub async fn with_max_connections(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = connection::connect(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Cheap liveness probe used by health checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

/// Format a timestamp the way every table stores it.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_string() -> String {
    format_timestamp(&Utc::now())
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{s}': {e}")))
}

pub(crate) fn parse_optional_timestamp(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_timestamp).transpose()
}

/// Accumulates `AND`-joined WHERE clauses with their string bind values.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    args: Vec<String>,
}

impl Filter {
    pub(crate) fn push(&mut self, clause: &str, args: impl IntoIterator<Item = String>) {
        self.clauses.push(clause.to_string());
        self.args.extend(args);
    }

    pub(crate) fn eq(&mut self, column: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.push(&format!("{column} = ?"), [v.to_string()]);
        }
    }

    pub(crate) fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn args(&self) -> &[String] {
        &self.args
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;

    pub async fn setup_test_db() -> Database {
        let db = Database::new(":memory:")
            .await
            .expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_lifecycle() {
        let db = test_support::setup_test_db().await;
        db.ping().await.expect("ping");
        assert_eq!(db.get_schema_version().await.expect("version"), 3);
        db.close().await;
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(&"2026-01-01T00:00:00Z".parse().expect("parse"));
        let b = format_timestamp(&"2026-01-01T00:00:00.5Z".parse().expect("parse"));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).expect("round trip").to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_filter_sql() {
        let mut f = Filter::default();
        assert_eq!(f.sql(), "");
        f.eq("industry", Some("Tech"));
        f.eq("status", Some(""));
        f.eq("city", None);
        f.push("(a LIKE ? OR b LIKE ?)", ["%x%".to_string(), "%x%".to_string()]);
        assert_eq!(f.sql(), " WHERE industry = ? AND (a LIKE ? OR b LIKE ?)");
        assert_eq!(f.args().len(), 3);
    }
}
