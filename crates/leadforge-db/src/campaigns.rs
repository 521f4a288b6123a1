//! Email campaigns, their recipients and open tracking.

use crate::error::{DatabaseError, Result};
use crate::leads::LeadFilter;
use crate::stats::percentage;
use crate::{now_string, parse_optional_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::fmt;

/// Campaign lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// Created, not sent
    Draft,
    /// Runner in progress
    Sending,
    /// Runner finished
    Completed,
    /// Runner aborted
    Failed,
}

impl CampaignStatus {
    /// Parse from string representation. Unknown values map to `Draft`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "sending" => Self::Sending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Draft,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Sending => write!(f, "sending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-recipient delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    /// Queued
    Pending,
    /// Delivered to the SMTP server
    Sent,
    /// Not delivered
    Failed,
}

impl RecipientStatus {
    /// Parse from string representation. Unknown values map to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A campaign row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Row id
    pub id: i64,
    /// Display name
    pub name: String,
    /// Template to render
    pub template_id: i64,
    /// Account used for the last send
    pub smtp_credential_id: Option<i64>,
    /// Lead targeting
    pub filters: LeadFilter,
    /// Lifecycle status
    pub status: CampaignStatus,
    /// Emails delivered by the last run
    pub emails_sent: i64,
    /// Failure reason
    pub error_message: Option<String>,
    /// When sending started
    pub sent_at: Option<DateTime<Utc>>,
    /// When sending ended
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new campaign.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCampaign {
    /// Display name
    pub name: String,
    /// Template to render
    pub template_id: i64,
    /// Lead targeting
    #[serde(default)]
    pub filters: LeadFilter,
}

fn campaign_from_row(row: &SqliteRow) -> Result<Campaign> {
    let filters: String = row.try_get("filters")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Campaign {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        template_id: row.try_get("template_id")?,
        smtp_credential_id: row.try_get("smtp_credential_id")?,
        filters: serde_json::from_str(&filters)?,
        status: CampaignStatus::parse(&status),
        emails_sent: row.try_get("emails_sent")?,
        error_message: row.try_get("error_message")?,
        sent_at: parse_optional_timestamp(row.try_get("sent_at")?)?,
        completed_at: parse_optional_timestamp(row.try_get("completed_at")?)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Create a campaign in `draft`.
pub async fn create(pool: &SqlitePool, new: &NewCampaign) -> Result<Campaign> {
    let now = now_string();
    let result = sqlx::query(
        "INSERT INTO email_campaigns (name, template_id, filters, status, created_at, updated_at)
         VALUES (?, ?, ?, 'draft', ?, ?)",
    )
    .bind(&new.name)
    .bind(new.template_id)
    .bind(serde_json::to_string(&new.filters)?)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, result.last_insert_rowid())
        .await?
        .ok_or(DatabaseError::NotFound)
}

/// Fetch a campaign.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Campaign>> {
    let row = sqlx::query("SELECT * FROM email_campaigns WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(campaign_from_row).transpose()
}

/// Number of campaigns.
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM email_campaigns")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// A campaign with its delivery numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignWithStats {
    /// Campaign row
    #[serde(flatten)]
    pub campaign: Campaign,
    /// Template name, if the template still exists
    pub template_name: Option<String>,
    /// Recipients created for the campaign
    pub total_recipients: i64,
    /// Recipients marked sent
    pub sent_emails: i64,
    /// Distinct recipients that opened
    pub opened_emails: i64,
    /// `opened / sent * 100`, one decimal
    pub open_rate: f64,
}

/// All campaigns with their stats, newest first.
pub async fn list_with_stats(pool: &SqlitePool) -> Result<Vec<CampaignWithStats>> {
    let rows = sqlx::query(
        "SELECT c.*, t.name AS template_name,
                (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = c.id) AS total_recipients,
                (SELECT COUNT(*) FROM campaign_recipients r WHERE r.campaign_id = c.id AND r.status = 'sent') AS sent_emails,
                (SELECT COUNT(DISTINCT e.tracking_id) FROM email_tracking e
                  WHERE e.campaign_id = c.id AND e.event_type = 'open') AS opened_emails
         FROM email_campaigns c
         LEFT JOIN email_templates t ON t.id = c.template_id
         ORDER BY c.created_at DESC, c.id DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let sent_emails: i64 = row.try_get("sent_emails")?;
            let opened_emails: i64 = row.try_get("opened_emails")?;
            Ok(CampaignWithStats {
                campaign: campaign_from_row(row)?,
                template_name: row.try_get("template_name")?,
                total_recipients: row.try_get("total_recipients")?,
                sent_emails,
                opened_emails,
                open_rate: percentage(opened_emails, sent_emails),
            })
        })
        .collect()
}

/// Claim a campaign for sending with the account used.
///
/// Returns `false` without touching the row when the campaign is missing or
/// already `sending`, so only one caller wins the claim.
pub async fn start_sending(pool: &SqlitePool, id: i64, smtp_credential_id: i64) -> Result<bool> {
    let now = now_string();
    let claimed = sqlx::query(
        "UPDATE email_campaigns
         SET status = 'sending', smtp_credential_id = ?, sent_at = ?, error_message = NULL,
             completed_at = NULL, updated_at = ?
         WHERE id = ? AND status != 'sending'",
    )
    .bind(smtp_credential_id)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(claimed > 0)
}

/// Set a campaign's status.
pub async fn set_status(pool: &SqlitePool, id: i64, status: CampaignStatus) -> Result<()> {
    sqlx::query("UPDATE email_campaigns SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(now_string())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark a campaign completed.
pub async fn complete(pool: &SqlitePool, id: i64, emails_sent: i64) -> Result<()> {
    let now = now_string();
    sqlx::query(
        "UPDATE email_campaigns
         SET status = 'completed', emails_sent = ?, completed_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(emails_sent)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a campaign failed.
pub async fn fail(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    let now = now_string();
    sqlx::query(
        "UPDATE email_campaigns
         SET status = 'failed', error_message = ?, completed_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(error)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// A campaign recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecipient {
    /// Row id
    pub id: i64,
    /// Owning campaign
    pub campaign_id: i64,
    /// Target lead
    pub lead_id: i64,
    /// Address at queue time
    pub email: Option<String>,
    /// Delivery state
    pub status: RecipientStatus,
    /// Pixel token, set once sent
    pub tracking_id: Option<String>,
    /// Failure reason
    pub error_message: Option<String>,
    /// Delivery time
    pub sent_at: Option<DateTime<Utc>>,
    /// Queue time
    pub created_at: DateTime<Utc>,
}

fn recipient_from_row(row: &SqliteRow) -> Result<CampaignRecipient> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(CampaignRecipient {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        lead_id: row.try_get("lead_id")?,
        email: row.try_get("email")?,
        status: RecipientStatus::parse(&status),
        tracking_id: row.try_get("tracking_id")?,
        error_message: row.try_get("error_message")?,
        sent_at: parse_optional_timestamp(row.try_get("sent_at")?)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Queue `pending` recipients for `(lead_id, email)` pairs in one transaction
/// and return exactly the rows inserted, in input order.
///
/// `pending` rows left by an earlier run (quota ran out) are dropped first;
/// the new queue is built from the current filters and covers those leads again.
pub async fn add_recipients(
    pool: &SqlitePool,
    campaign_id: i64,
    recipients: &[(i64, Option<String>)],
) -> Result<Vec<CampaignRecipient>> {
    let now = now_string();
    let mut tx = pool.begin().await?;
    let dropped = sqlx::query(
        "DELETE FROM campaign_recipients WHERE campaign_id = ? AND status = 'pending'",
    )
    .bind(campaign_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if dropped > 0 {
        tracing::debug!(campaign_id, dropped, "Dropped stale pending recipients");
    }

    let mut queued = Vec::with_capacity(recipients.len());
    for (lead_id, email) in recipients {
        let row = sqlx::query(
            "INSERT INTO campaign_recipients (campaign_id, lead_id, email, status, created_at)
             VALUES (?, ?, ?, 'pending', ?)
             RETURNING *",
        )
        .bind(campaign_id)
        .bind(lead_id)
        .bind(email)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;
        queued.push(recipient_from_row(&row)?);
    }
    tx.commit().await?;
    Ok(queued)
}

/// Mark a recipient delivered.
pub async fn mark_sent(pool: &SqlitePool, recipient_id: i64, tracking_id: &str) -> Result<()> {
    sqlx::query(
        "UPDATE campaign_recipients SET status = 'sent', tracking_id = ?, sent_at = ?, error_message = NULL
         WHERE id = ?",
    )
    .bind(tracking_id)
    .bind(now_string())
    .bind(recipient_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark a recipient failed.
pub async fn mark_failed(pool: &SqlitePool, recipient_id: i64, error: &str) -> Result<()> {
    sqlx::query("UPDATE campaign_recipients SET status = 'failed', error_message = ? WHERE id = ?")
        .bind(error)
        .bind(recipient_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// A campaign's recipients in queue order.
pub async fn list_recipients(pool: &SqlitePool, campaign_id: i64) -> Result<Vec<CampaignRecipient>> {
    let rows = sqlx::query("SELECT * FROM campaign_recipients WHERE campaign_id = ? ORDER BY id ASC")
        .bind(campaign_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(recipient_from_row).collect()
}

/// A tracking event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Row id
    pub id: i64,
    /// Campaign resolved from the tracking id, if known
    pub campaign_id: Option<i64>,
    /// Pixel token
    pub tracking_id: String,
    /// Event kind, `open`
    pub event_type: String,
    /// Client IP
    pub ip_address: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Event time
    pub timestamp: DateTime<Utc>,
}

fn event_from_row(row: &SqliteRow) -> Result<TrackingEvent> {
    let timestamp: String = row.try_get("timestamp")?;
    Ok(TrackingEvent {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        tracking_id: row.try_get("tracking_id")?,
        event_type: row.try_get("event_type")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

/// Record an open. The campaign is resolved from the recipient carrying
/// `tracking_id`; unknown ids are still recorded with no campaign.
///
/// Returns the resolved campaign id.
pub async fn record_open(
    pool: &SqlitePool,
    tracking_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Option<i64>> {
    let campaign_id: Option<i64> =
        sqlx::query_scalar("SELECT campaign_id FROM campaign_recipients WHERE tracking_id = ?")
            .bind(tracking_id)
            .fetch_optional(pool)
            .await?;

    sqlx::query(
        "INSERT INTO email_tracking (campaign_id, tracking_id, event_type, ip_address, user_agent, timestamp)
         VALUES (?, ?, 'open', ?, ?, ?)",
    )
    .bind(campaign_id)
    .bind(tracking_id)
    .bind(ip_address)
    .bind(user_agent)
    .bind(now_string())
    .execute(pool)
    .await?;

    Ok(campaign_id)
}

/// Tracking events for a campaign, oldest first.
pub async fn list_tracking(pool: &SqlitePool, campaign_id: i64) -> Result<Vec<TrackingEvent>> {
    let rows = sqlx::query(
        "SELECT * FROM email_tracking WHERE campaign_id = ? ORDER BY timestamp ASC, id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(event_from_row).collect()
}

/// One line of a campaign export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientReport {
    /// Recipient row
    pub recipient: CampaignRecipient,
    /// Lead company
    pub company_name: Option<String>,
    /// Lead first name
    pub first_name: Option<String>,
    /// Lead last name
    pub last_name: Option<String>,
    /// Lead industry
    pub industry: Option<String>,
    /// First open, if any
    pub first_open: Option<TrackingEvent>,
}

/// Recipients joined with their lead and first open event.
pub async fn recipient_report(pool: &SqlitePool, campaign_id: i64) -> Result<Vec<RecipientReport>> {
    let rows = sqlx::query(
        "SELECT r.*, l.company_name, l.first_name, l.last_name, l.industry
         FROM campaign_recipients r
         LEFT JOIN leads l ON l.id = r.lead_id
         WHERE r.campaign_id = ?
         ORDER BY r.id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    let events = list_tracking(pool, campaign_id).await?;

    rows.iter()
        .map(|row| {
            let recipient = recipient_from_row(row)?;
            let first_open = recipient.tracking_id.as_deref().and_then(|tid| {
                events
                    .iter()
                    .find(|e| e.tracking_id == tid && e.event_type == "open")
                    .cloned()
            });
            Ok(RecipientReport {
                recipient,
                company_name: row.try_get("company_name")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                industry: row.try_get("industry")?,
                first_open,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::email_templates::{self, EmailTemplateInput};
    use crate::leads::{self, LeadInput};
    use crate::test_support::setup_test_db;

    async fn template(pool: &SqlitePool) -> i64 {
        email_templates::create(
            pool,
            &EmailTemplateInput {
                name: "Intro".to_string(),
                subject: "Hi".to_string(),
                body: "<p>Hello there</p>".to_string(),
                variables: vec![],
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn lead(pool: &SqlitePool, company: &str, email: Option<&str>) -> i64 {
        leads::create(
            pool,
            &LeadInput {
                company_name: Some(company.to_string()),
                email: email.map(str::to_string),
                industry: Some("Tech".to_string()),
                ..LeadInput::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_campaign_send_flow_and_stats() {
        let db = setup_test_db().await;
        let template_id = template(db.pool()).await;
        let campaign = create(
            db.pool(),
            &NewCampaign {
                name: "Spring".to_string(),
                template_id,
                filters: LeadFilter {
                    industry: Some("Tech".to_string()),
                    ..LeadFilter::default()
                },
            },
        )
        .await
        .expect("create campaign");
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.filters.industry.as_deref(), Some("Tech"));

        let a = lead(db.pool(), "A", Some("a@a.com")).await;
        let b = lead(db.pool(), "B", None).await;
        let recipients = add_recipients(
            db.pool(),
            campaign.id,
            &[(a, Some("a@a.com".to_string())), (b, None)],
        )
        .await
        .expect("add recipients");
        assert_eq!(recipients.len(), 2);
        assert!(recipients.iter().all(|r| r.status == RecipientStatus::Pending));

        mark_sent(db.pool(), recipients[0].id, "abc123").await.unwrap();
        mark_failed(db.pool(), recipients[1].id, "no email address").await.unwrap();
        complete(db.pool(), campaign.id, 1).await.unwrap();

        let resolved = record_open(db.pool(), "abc123", Some("10.0.0.1"), Some("Mail/1.0"))
            .await
            .unwrap();
        assert_eq!(resolved, Some(campaign.id));
        record_open(db.pool(), "abc123", None, None).await.unwrap();
        assert_eq!(record_open(db.pool(), "unknown", None, None).await.unwrap(), None);

        let listed = list_with_stats(db.pool()).await.unwrap();
        assert_eq!(listed.len(), 1);
        let stats = &listed[0];
        assert_eq!(stats.campaign.status, CampaignStatus::Completed);
        assert_eq!(stats.template_name.as_deref(), Some("Intro"));
        assert_eq!(stats.total_recipients, 2);
        assert_eq!(stats.sent_emails, 1);
        assert_eq!(stats.opened_emails, 1);
        assert!((stats.open_rate - 100.0).abs() < f64::EPSILON);

        let report = recipient_report(db.pool(), campaign.id).await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].company_name.as_deref(), Some("A"));
        let open = report[0].first_open.as_ref().expect("opened");
        assert_eq!(open.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(report[1].first_open.is_none());
        assert_eq!(report[1].recipient.error_message.as_deref(), Some("no email address"));
    }

    #[tokio::test]
    async fn test_start_sending_and_fail() {
        let db = setup_test_db().await;
        let template_id = template(db.pool()).await;
        let campaign = create(
            db.pool(),
            &NewCampaign {
                name: "C".to_string(),
                template_id,
                filters: LeadFilter::default(),
            },
        )
        .await
        .unwrap();
        let smtp = crate::smtp_credentials::create(
            db.pool(),
            &crate::smtp_credentials::SmtpCredentialInput {
                name: "s".to_string(),
                host: "localhost".to_string(),
                port: 25,
                username: "u@example.com".to_string(),
                password: "p".to_string(),
                encryption: crate::smtp_credentials::SmtpEncryption::None,
                daily_limit: 10,
            },
        )
        .await
        .unwrap();

        assert!(start_sending(db.pool(), campaign.id, smtp.id).await.unwrap());
        assert!(!start_sending(db.pool(), campaign.id, smtp.id).await.unwrap());
        assert!(!start_sending(db.pool(), 9999, smtp.id).await.unwrap());
        let c = get(db.pool(), campaign.id).await.unwrap().unwrap();
        assert_eq!(c.status, CampaignStatus::Sending);
        assert_eq!(c.smtp_credential_id, Some(smtp.id));
        assert!(c.sent_at.is_some());

        fail(db.pool(), campaign.id, "smtp down").await.unwrap();
        let c = get(db.pool(), campaign.id).await.unwrap().unwrap();
        assert_eq!(c.status, CampaignStatus::Failed);
        assert_eq!(c.error_message.as_deref(), Some("smtp down"));
        assert_eq!(count(db.pool()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_requeue_returns_only_new_rows_and_drops_stale_pending() {
        let db = setup_test_db().await;
        let template_id = template(db.pool()).await;
        let campaign = create(
            db.pool(),
            &NewCampaign {
                name: "Resend".to_string(),
                template_id,
                filters: LeadFilter::default(),
            },
        )
        .await
        .unwrap();
        let a = lead(db.pool(), "A", Some("a@a.com")).await;
        let b = lead(db.pool(), "B", Some("b@b.com")).await;
        let pairs = vec![(a, Some("a@a.com".to_string())), (b, Some("b@b.com".to_string()))];

        // First run only reaches A; B stays pending.
        let first = add_recipients(db.pool(), campaign.id, &pairs).await.unwrap();
        mark_sent(db.pool(), first[0].id, "first-a").await.unwrap();

        let second = add_recipients(db.pool(), campaign.id, &pairs).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].lead_id, a);
        assert_eq!(second[0].email.as_deref(), Some("a@a.com"));
        assert_eq!(second[1].lead_id, b);
        assert_eq!(second[1].email.as_deref(), Some("b@b.com"));
        assert!(second.iter().all(|r| r.status == RecipientStatus::Pending));

        let all = list_recipients(db.pool(), campaign.id).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|r| r.status == RecipientStatus::Sent).count(), 1);
        assert!(all.iter().all(|r| r.id != first[1].id));
    }
}
