//! SMTP accounts used for campaign sending, with per-day send counters.

use crate::error::{DatabaseError, Result};
use crate::{now_string, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt;

/// Transport security for an SMTP account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    /// Plain connection
    None,
    /// Implicit TLS (usually port 465)
    Ssl,
    /// STARTTLS (usually port 587)
    #[default]
    Tls,
}

impl SmtpEncryption {
    /// Parse `none`, `ssl` or `tls`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "ssl" => Some(Self::Ssl),
            "tls" => Some(Self::Tls),
            _ => None,
        }
    }
}

impl fmt::Display for SmtpEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Ssl => write!(f, "ssl"),
            Self::Tls => write!(f, "tls"),
        }
    }
}

/// A stored SMTP account. The password is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmtpCredential {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login, also used as the sender address
    pub username: String,
    /// Login secret
    #[serde(skip_serializing)]
    pub password: String,
    /// Transport security
    pub encryption: SmtpEncryption,
    /// Emails allowed per day
    pub daily_limit: i64,
    /// Emails sent today
    pub daily_sent: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

impl SmtpCredential {
    /// Emails still allowed today.
    #[must_use]
    pub fn remaining_today(&self) -> i64 {
        (self.daily_limit - self.daily_sent).max(0)
    }
}

/// Fields for creating or replacing an SMTP account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SmtpCredentialInput {
    /// Display name
    pub name: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login
    pub username: String,
    /// Login secret
    pub password: String,
    /// Transport security
    pub encryption: SmtpEncryption,
    /// Emails allowed per day
    pub daily_limit: i64,
}

fn credential_from_row(row: &SqliteRow) -> Result<SmtpCredential> {
    let port: i64 = row.try_get("port")?;
    let encryption: String = row.try_get("encryption")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(SmtpCredential {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        host: row.try_get("host")?,
        port: u16::try_from(port)
            .map_err(|_| DatabaseError::Decode(format!("invalid SMTP port {port}")))?,
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        encryption: SmtpEncryption::parse(&encryption).ok_or_else(|| {
            DatabaseError::Decode(format!("invalid SMTP encryption '{encryption}'"))
        })?,
        daily_limit: row.try_get("daily_limit")?,
        daily_sent: row.try_get("daily_sent")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Store a new account.
pub async fn create(pool: &SqlitePool, input: &SmtpCredentialInput) -> Result<SmtpCredential> {
    let now = now_string();
    let result = sqlx::query(
        "INSERT INTO smtp_credentials (name, host, port, username, password, encryption,
                                       daily_limit, daily_sent, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&input.name)
    .bind(&input.host)
    .bind(i64::from(input.port))
    .bind(&input.username)
    .bind(&input.password)
    .bind(input.encryption.to_string())
    .bind(input.daily_limit)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid())
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// All accounts, newest first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<SmtpCredential>> {
    let rows = sqlx::query("SELECT * FROM smtp_credentials ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(credential_from_row).collect()
}

/// Fetch an account.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<SmtpCredential>> {
    let row = sqlx::query("SELECT * FROM smtp_credentials WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(credential_from_row).transpose()
}

/// Replace an account's settings. The daily counter is kept.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    input: &SmtpCredentialInput,
) -> Result<Option<SmtpCredential>> {
    let result = sqlx::query(
        "UPDATE smtp_credentials
         SET name = ?, host = ?, port = ?, username = ?, password = ?, encryption = ?,
             daily_limit = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&input.name)
    .bind(&input.host)
    .bind(i64::from(input.port))
    .bind(&input.username)
    .bind(&input.password)
    .bind(input.encryption.to_string())
    .bind(input.daily_limit)
    .bind(now_string())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

/// Delete an account.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM smtp_credentials WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Count one sent email against today's limit.
pub async fn increment_daily_sent(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE smtp_credentials SET daily_sent = daily_sent + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Zero every account's daily counter. Returns the number of accounts reset.
pub async fn reset_daily_limits(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("UPDATE smtp_credentials SET daily_sent = 0, updated_at = ?")
        .bind(now_string())
        .execute(pool)
        .await?;
    tracing::info!(accounts = result.rows_affected(), "SMTP daily limits reset");
    Ok(result.rows_affected())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;

    fn input() -> SmtpCredentialInput {
        SmtpCredentialInput {
            name: "Primary".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "sender@example.com".to_string(),
            password: "secret".to_string(),
            encryption: SmtpEncryption::Tls,
            daily_limit: 2,
        }
    }

    #[tokio::test]
    async fn test_crud() {
        let db = setup_test_db().await;
        let created = create(db.pool(), &input()).await.expect("create");
        assert_eq!(created.port, 587);
        assert_eq!(created.daily_sent, 0);

        let mut changed = input();
        changed.encryption = SmtpEncryption::Ssl;
        changed.port = 465;
        let updated = update(db.pool(), created.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.encryption, SmtpEncryption::Ssl);
        assert_eq!(updated.port, 465);

        assert_eq!(list(db.pool()).await.unwrap().len(), 1);
        assert!(update(db.pool(), 999, &changed).await.unwrap().is_none());
        assert!(delete(db.pool(), created.id).await.unwrap());
        assert!(get(db.pool(), created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_daily_counter() {
        let db = setup_test_db().await;
        let cred = create(db.pool(), &input()).await.unwrap();
        increment_daily_sent(db.pool(), cred.id).await.unwrap();
        increment_daily_sent(db.pool(), cred.id).await.unwrap();
        increment_daily_sent(db.pool(), cred.id).await.unwrap();

        let cred = get(db.pool(), cred.id).await.unwrap().unwrap();
        assert_eq!(cred.daily_sent, 3);
        assert_eq!(cred.remaining_today(), 0);

        assert_eq!(reset_daily_limits(db.pool()).await.unwrap(), 1);
        let cred = get(db.pool(), cred.id).await.unwrap().unwrap();
        assert_eq!(cred.remaining_today(), 2);
    }

    #[test]
    fn test_password_not_serialized() {
        let cred = SmtpCredential {
            id: 1,
            name: "n".into(),
            host: "h".into(),
            port: 25,
            username: "u".into(),
            password: "hunter2".into(),
            encryption: SmtpEncryption::None,
            daily_limit: 10,
            daily_sent: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&cred).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("\"encryption\":\"none\""));
    }
}
