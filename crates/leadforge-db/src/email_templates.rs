//! Email templates with `{{variable}}` placeholders.

use crate::error::{DatabaseError, Result};
use crate::{now_string, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Subject line (may contain placeholders)
    pub subject: String,
    /// HTML body
    pub body: String,
    /// Placeholder names found in the body
    pub variables: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating or replacing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplateInput {
    /// Display name
    pub name: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body: String,
    /// Placeholder names
    pub variables: Vec<String>,
}

fn template_from_row(row: &SqliteRow) -> Result<EmailTemplate> {
    let variables: String = row.try_get("variables")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(EmailTemplate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        variables: serde_json::from_str(&variables)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Store a template.
pub async fn create(pool: &SqlitePool, input: &EmailTemplateInput) -> Result<EmailTemplate> {
    let now = now_string();
    let result = sqlx::query(
        "INSERT INTO email_templates (name, subject, body, variables, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&input.name)
    .bind(&input.subject)
    .bind(&input.body)
    .bind(serde_json::to_string(&input.variables)?)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid())
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// All templates, newest first.
pub async fn list(pool: &SqlitePool) -> Result<Vec<EmailTemplate>> {
    let rows = sqlx::query("SELECT * FROM email_templates ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(template_from_row).collect()
}

/// Fetch a template.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<EmailTemplate>> {
    let row = sqlx::query("SELECT * FROM email_templates WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(template_from_row).transpose()
}

/// Replace a template.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    input: &EmailTemplateInput,
) -> Result<Option<EmailTemplate>> {
    let result = sqlx::query(
        "UPDATE email_templates SET name = ?, subject = ?, body = ?, variables = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&input.name)
    .bind(&input.subject)
    .bind(&input.body)
    .bind(serde_json::to_string(&input.variables)?)
    .bind(now_string())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

/// Delete a template.
///
/// # Errors
/// `Conflict` when a campaign still references the template.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let in_use: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM email_campaigns WHERE template_id = ?")
            .bind(id)
            .fetch_one(pool)
            .await?;
    if in_use > 0 {
        return Err(DatabaseError::Conflict(format!(
            "template {id} is used by {in_use} campaign(s)"
        )));
    }

    let result = sqlx::query("DELETE FROM email_templates WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Number of templates.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM email_templates")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::setup_test_db;

    fn input(name: &str) -> EmailTemplateInput {
        EmailTemplateInput {
            name: name.to_string(),
            subject: "Hello {{first_name}}".to_string(),
            body: "<p>Hi {{first_name}} at {{company}}</p>".to_string(),
            variables: vec!["first_name".to_string(), "company".to_string()],
        }
    }

    #[tokio::test]
    async fn test_template_crud() {
        let db = setup_test_db().await;
        let t = create(db.pool(), &input("Intro")).await.expect("create");
        assert_eq!(t.variables, vec!["first_name", "company"]);

        let mut changed = input("Intro v2");
        changed.variables = vec!["first_name".to_string()];
        let t2 = update(db.pool(), t.id, &changed).await.unwrap().unwrap();
        assert_eq!(t2.name, "Intro v2");
        assert_eq!(t2.variables.len(), 1);

        assert_eq!(list(db.pool()).await.unwrap().len(), 1);
        assert_eq!(count(db.pool()).await.unwrap(), 1);
        assert!(delete(db.pool(), t.id).await.unwrap());
        assert!(get(db.pool(), t.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_in_use_template_conflicts() {
        let db = setup_test_db().await;
        let t = create(db.pool(), &input("Intro")).await.unwrap();
        crate::campaigns::create(
            db.pool(),
            &crate::campaigns::NewCampaign {
                name: "Spring".to_string(),
                template_id: t.id,
                filters: crate::leads::LeadFilter::default(),
            },
        )
        .await
        .unwrap();

        let err = delete(db.pool(), t.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }
}
