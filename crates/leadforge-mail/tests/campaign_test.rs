use leadforge_core::{EmailMarketingConfig, LeadStatus};
use leadforge_db::campaigns::{self, CampaignStatus, NewCampaign, RecipientStatus};
use leadforge_db::email_templates::{self, EmailTemplateInput};
use leadforge_db::leads::{self, LeadFilter, LeadInput};
use leadforge_db::smtp_credentials::{self, SmtpCredentialInput, SmtpEncryption};
use leadforge_db::Database;
use leadforge_mail::{
    CampaignRunner, Delivery, MailError, Mailer, OutgoingEmail, SendSummary, SmtpSettings,
};
use std::sync::{Arc, Mutex};

/// Records sent mail; addresses starting with `bounce@` fail.
#[derive(Default)]
struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait::async_trait]
impl Mailer for FakeMailer {
    async fn verify(&self, _settings: &SmtpSettings) -> leadforge_mail::Result<()> {
        Ok(())
    }

    async fn send(&self, _settings: &SmtpSettings, email: &OutgoingEmail) -> leadforge_mail::Result<()> {
        if email.to.starts_with("bounce@") {
            return Err(MailError::Send("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct Fixture {
    db: Arc<Database>,
    mailer: Arc<FakeMailer>,
    campaign_id: i64,
    template: email_templates::EmailTemplate,
}

async fn fixture() -> Fixture {
    let db = Database::new(":memory:").await.expect("open database");
    db.run_migrations().await.expect("migrations");
    let template = email_templates::create(
        db.pool(),
        &EmailTemplateInput {
            name: "Intro".to_string(),
            subject: "Hello {{first_name}}".to_string(),
            body: "<p>{{company}} in {{city}}</p>".to_string(),
            variables: vec!["company".to_string(), "city".to_string()],
        },
    )
    .await
    .unwrap();
    let campaign = campaigns::create(
        db.pool(),
        &NewCampaign {
            name: "Spring".to_string(),
            template_id: template.id,
            filters: LeadFilter::default(),
        },
    )
    .await
    .unwrap();

    Fixture {
        db: Arc::new(db),
        mailer: Arc::new(FakeMailer::default()),
        campaign_id: campaign.id,
        template,
    }
}

async fn smtp(db: &Database, daily_limit: i64) -> smtp_credentials::SmtpCredential {
    smtp_credentials::create(
        db.pool(),
        &SmtpCredentialInput {
            name: "Primary".to_string(),
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "sales@leadforge.io".to_string(),
            password: "secret".to_string(),
            encryption: SmtpEncryption::Tls,
            daily_limit,
        },
    )
    .await
    .unwrap()
}

async fn queue(db: &Database, campaign_id: i64, leads_in: &[(&str, Option<&str>)]) -> Vec<Delivery> {
    let mut stored = Vec::new();
    for (company, email) in leads_in {
        let lead = leads::create(
            db.pool(),
            &LeadInput {
                company_name: Some((*company).to_string()),
                email: email.map(ToString::to_string),
                first_name: Some("Dana".to_string()),
                ..LeadInput::default()
            },
        )
        .await
        .unwrap();
        stored.push(lead);
    }
    let pairs: Vec<_> = stored.iter().map(|l| (l.id, l.email.clone())).collect();
    let recipients = campaigns::add_recipients(db.pool(), campaign_id, &pairs).await.unwrap();
    Delivery::pair(recipients, stored)
}

fn runner(f: &Fixture, tracking_enabled: bool) -> CampaignRunner {
    CampaignRunner::new(
        f.db.clone(),
        f.mailer.clone(),
        EmailMarketingConfig {
            send_delay_ms: 0,
            tracking_enabled,
            ..EmailMarketingConfig::default()
        },
        "http://localhost:5002",
    )
}

#[tokio::test]
async fn test_run_sends_tracks_and_records_failures() {
    let f = fixture().await;
    let account = smtp(&f.db, 10).await;
    let deliveries = queue(
        &f.db,
        f.campaign_id,
        &[
            ("Sunrise Cafe", Some("owner@sunrisecafe.com")),
            ("No Email Inc", None),
            ("Bounce Co", Some("bounce@bounce.co")),
        ],
    )
    .await;

    let summary = runner(&f, true)
        .run(f.campaign_id, &f.template, &account, &deliveries)
        .await
        .expect("run");
    assert_eq!(
        summary,
        SendSummary {
            sent: 1,
            failed: 2,
            skipped: 0
        }
    );

    let sent = f.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "sales@leadforge.io");
    assert_eq!(sent[0].subject, "Hello Dana");
    assert!(sent[0].html_body.starts_with("<p>Sunrise Cafe in your location</p>"));

    let recipients = campaigns::list_recipients(f.db.pool(), f.campaign_id).await.unwrap();
    assert_eq!(recipients[0].status, RecipientStatus::Sent);
    let tracking_id = recipients[0].tracking_id.clone().unwrap();
    assert!(sent[0]
        .html_body
        .contains(&format!("/api/email-marketing/track/{tracking_id}")));
    assert_eq!(recipients[1].status, RecipientStatus::Failed);
    assert_eq!(
        recipients[1].error_message.as_deref(),
        Some("Lead has no email address")
    );
    assert_eq!(recipients[2].status, RecipientStatus::Failed);
    assert!(recipients[2]
        .error_message
        .as_deref()
        .unwrap()
        .contains("550"));

    let campaign = campaigns::get(f.db.pool(), f.campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.emails_sent, 1);

    let account = smtp_credentials::get(f.db.pool(), account.id).await.unwrap().unwrap();
    assert_eq!(account.daily_sent, 1);

    let lead = leads::get(f.db.pool(), deliveries[0].lead.id).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::Contacted);
    assert_eq!(lead.contact_count, 1);
}

#[tokio::test]
async fn test_run_stops_at_daily_quota() {
    let f = fixture().await;
    let account = smtp(&f.db, 2).await;
    smtp_credentials::increment_daily_sent(f.db.pool(), account.id).await.unwrap();
    let account = smtp_credentials::get(f.db.pool(), account.id).await.unwrap().unwrap();

    let deliveries = queue(
        &f.db,
        f.campaign_id,
        &[("A", Some("a@a.com")), ("B", Some("b@b.com"))],
    )
    .await;
    let summary = runner(&f, false)
        .run(f.campaign_id, &f.template, &account, &deliveries)
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.skipped, 1);
    let recipients = campaigns::list_recipients(f.db.pool(), f.campaign_id).await.unwrap();
    assert_eq!(recipients[1].status, RecipientStatus::Pending);

    let sent = f.mailer.sent.lock().unwrap().clone();
    assert!(!sent[0].html_body.contains("<img"), "tracking disabled");
}

#[tokio::test]
async fn test_resend_after_partial_run_pairs_each_recipient_with_its_lead() {
    let f = fixture().await;
    let account = smtp(&f.db, 1).await;
    let first = queue(
        &f.db,
        f.campaign_id,
        &[("Acme", Some("a@acme.com")), ("Beta", Some("b@beta.com"))],
    )
    .await;
    let summary = runner(&f, false)
        .run(f.campaign_id, &f.template, &account, &first)
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);

    smtp_credentials::reset_daily_limits(f.db.pool()).await.unwrap();
    let account = smtp_credentials::get(f.db.pool(), account.id).await.unwrap().unwrap();

    // Re-queue in reverse order; pairing must follow lead ids, not positions.
    let targets: Vec<_> = first.iter().rev().map(|d| d.lead.clone()).collect();
    let pairs: Vec<_> = targets.iter().map(|l| (l.id, l.email.clone())).collect();
    let recipients = campaigns::add_recipients(f.db.pool(), f.campaign_id, &pairs)
        .await
        .unwrap();
    assert_eq!(recipients.len(), 2);
    let second = Delivery::pair(recipients, targets);
    assert_eq!(second.len(), 2);
    for delivery in &second {
        assert_eq!(delivery.recipient.lead_id, delivery.lead.id);
        assert_eq!(delivery.recipient.email, delivery.lead.email);
    }

    runner(&f, false)
        .run(f.campaign_id, &f.template, &account, &second)
        .await
        .unwrap();
    let sent = f.mailer.sent.lock().unwrap().clone();
    let beta = sent.iter().find(|e| e.to == "b@beta.com").expect("beta mailed");
    assert!(beta.html_body.contains("Beta"));
    assert!(!beta.html_body.contains("Acme"));

    // Quota of one again: Acme is still queued, once.
    let all = campaigns::list_recipients(f.db.pool(), f.campaign_id).await.unwrap();
    let pending: Vec<_> = all.iter().filter(|r| r.status == RecipientStatus::Pending).collect();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].lead_id, second[1].lead.id);
    assert_eq!(pending[0].email.as_deref(), Some("a@acme.com"));
}
