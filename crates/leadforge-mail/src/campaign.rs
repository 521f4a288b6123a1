//! Campaign delivery.
//!
//! Recipients are queued before the runner starts; the runner walks them in
//! order until the account's daily quota is used up. Recipients past the
//! quota stay `pending` until the campaign is queued again.

use crate::error::Result;
use crate::sender::{body_hash, Mailer, OutgoingEmail, SmtpSettings};
use crate::templates::render_for_lead;
use crate::tracking::{generate_tracking_id, tracking_pixel_html};
use leadforge_core::EmailMarketingConfig;
use leadforge_db::campaigns::{self, CampaignRecipient};
use leadforge_db::email_templates::EmailTemplate;
use leadforge_db::leads::{self, Lead};
use leadforge_db::smtp_credentials::{self, SmtpCredential};
use leadforge_db::Database;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A queued recipient and the lead it was created for.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: CampaignRecipient,
    pub lead: Lead,
}

impl Delivery {
    /// Match freshly queued recipients to their leads by `lead_id`.
    /// Recipients whose lead is not in `leads` are dropped.
    pub fn pair(recipients: Vec<CampaignRecipient>, leads: Vec<Lead>) -> Vec<Delivery> {
        let mut by_id: HashMap<i64, Lead> = leads.into_iter().map(|l| (l.id, l)).collect();
        recipients
            .into_iter()
            .filter_map(|recipient| {
                let lead = by_id.remove(&recipient.lead_id)?;
                Some(Delivery { recipient, lead })
            })
            .collect()
    }

    fn address(&self) -> Option<&str> {
        self.recipient
            .email
            .as_deref()
            .or(self.lead.email.as_deref())
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

/// Counts from one campaign run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub sent: usize,
    pub failed: usize,
    /// Recipients left `pending` because the daily quota ran out
    pub skipped: usize,
}

/// Sends a campaign through one SMTP account.
pub struct CampaignRunner {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    config: EmailMarketingConfig,
    backend_url: String,
}

impl CampaignRunner {
    pub fn new(
        db: Arc<Database>,
        mailer: Arc<dyn Mailer>,
        config: EmailMarketingConfig,
        backend_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            mailer,
            config,
            backend_url: backend_url.into(),
        }
    }

    /// Deliver `deliveries` and close the campaign as `completed`, or as
    /// `failed` when a database write aborts the run.
    pub async fn run(
        &self,
        campaign_id: i64,
        template: &EmailTemplate,
        smtp: &SmtpCredential,
        deliveries: &[Delivery],
    ) -> Result<SendSummary> {
        let pool = self.db.pool();
        match self.send_all(template, smtp, deliveries).await {
            Ok(summary) => {
                campaigns::complete(pool, campaign_id, i64::try_from(summary.sent).unwrap_or(i64::MAX))
                    .await?;
                tracing::info!(
                    campaign_id,
                    sent = summary.sent,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Campaign completed"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(campaign_id, "Campaign failed: {}", e);
                campaigns::fail(pool, campaign_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn send_all(
        &self,
        template: &EmailTemplate,
        smtp: &SmtpCredential,
        deliveries: &[Delivery],
    ) -> Result<SendSummary> {
        let pool = self.db.pool();
        let settings = SmtpSettings::from(smtp);
        let quota = usize::try_from(smtp.remaining_today()).unwrap_or(0);
        let delay = Duration::from_millis(self.config.send_delay_ms);
        let mut summary = SendSummary {
            skipped: deliveries.len().saturating_sub(quota),
            ..SendSummary::default()
        };

        for delivery in deliveries.iter().take(quota) {
            let recipient_id = delivery.recipient.id;
            let Some(to) = delivery.address() else {
                campaigns::mark_failed(pool, recipient_id, "Lead has no email address").await?;
                summary.failed += 1;
                continue;
            };

            let rendered = render_for_lead(&template.subject, &template.body, &delivery.lead);
            let tracking_id = generate_tracking_id();
            let mut body = rendered.body;
            if self.config.tracking_enabled {
                body.push_str(&tracking_pixel_html(&self.backend_url, &tracking_id));
            }
            let email = OutgoingEmail {
                from: smtp.username.clone(),
                from_name: Some(self.config.default_from_name.clone()),
                to: to.to_string(),
                subject: rendered.subject,
                html_body: body,
            };

            match self.mailer.send(&settings, &email).await {
                Ok(()) => {
                    campaigns::mark_sent(pool, recipient_id, &tracking_id).await?;
                    smtp_credentials::increment_daily_sent(pool, smtp.id).await?;
                    leads::mark_contacted(pool, delivery.lead.id).await?;
                    summary.sent += 1;
                    tracing::debug!(
                        recipient_id,
                        body_sha256 = %body_hash(&email.html_body),
                        "Campaign email delivered"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(recipient_id, "Error sending email to {}: {}", to, e);
                    campaigns::mark_failed(pool, recipient_id, &e.to_string()).await?;
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}
