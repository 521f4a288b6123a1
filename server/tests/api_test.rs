use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use leadforge_browser::PageFetcher;
use leadforge_core::AppConfig;
use leadforge_db::campaigns::{self, CampaignStatus};
use leadforge_db::Database;
use leadforge_enrichment::{DomainVerification, DomainVerifier};
use leadforge_mail::{MailError, Mailer, OutgoingEmail, SmtpSettings};
use leadforge_server::AppState;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const YELLOW_PAGES_HTML: &str = r#"
    <div class="result">
        <a class="business-name">Sunrise Cafe</a>
        <div class="phones">(720) 555-0142</div>
        <div class="street-address">88 Larimer St</div>
        <div class="locality">Denver, CO 80205</div>
        <a class="track-visit-website" href="https://www.sunrisecafe.com">Website</a>
    </div>
    <div class="result">
        <a class="business-name">Sunrise Cafe</a>
        <a class="track-visit-website" href="https://www.sunrisecafe.com">Website</a>
    </div>
    <div class="result">
        <a class="business-name">Sunrise Motors</a>
        <div class="locality">Boulder, CO 80301</div>
    </div>
"#;

struct FakeFetcher;

#[async_trait::async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _wait_selector: Option<&str>) -> leadforge_browser::Result<String> {
        if url.contains("yellowpages.com") {
            Ok(YELLOW_PAGES_HTML.to_string())
        } else {
            Ok("<html></html>".to_string())
        }
    }
}

struct AllGoodVerifier;

#[async_trait::async_trait]
impl DomainVerifier for AllGoodVerifier {
    async fn verify_domain(&self, domain: &str) -> DomainVerification {
        DomainVerification {
            domain: domain.to_string(),
            has_mx_records: true,
            is_reachable: true,
            mx_records: vec![format!("mx.{domain}")],
            verified_at: Utc::now(),
            error: None,
        }
    }
}

/// Accepts every login except on `bad.example.com`; records sent mail.
#[derive(Default)]
struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait::async_trait]
impl Mailer for FakeMailer {
    async fn verify(&self, settings: &SmtpSettings) -> leadforge_mail::Result<()> {
        if settings.host == "bad.example.com" {
            return Err(MailError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    async fn send(&self, _settings: &SmtpSettings, email: &OutgoingEmail) -> leadforge_mail::Result<()> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    db: Arc<Database>,
    mailer: Arc<FakeMailer>,
    backup_dir: tempfile::TempDir,
}

async fn app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let db = Database::new(":memory:").await.expect("open database");
    db.run_migrations().await.expect("migrations");
    let db = Arc::new(db);

    let mut config = AppConfig::default();
    config.scraping.sources = vec!["yellowpages".to_string()];
    config.email_marketing.send_delay_ms = 0;
    configure(&mut config);

    let mailer = Arc::new(FakeMailer::default());
    let backup_dir = tempfile::tempdir().expect("tempdir");
    let state = AppState::new(
        config,
        Arc::clone(&db),
        Arc::new(FakeFetcher),
        Arc::new(AllGoodVerifier),
        mailer.clone(),
        backup_dir.path().to_path_buf(),
    )
    .expect("state");

    TestApp {
        router: leadforge_server::router(state),
        db,
        mailer,
        backup_dir,
    }
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

impl TestApp {
    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    async fn create_lead(&self, body: Value) -> i64 {
        let (status, lead) = self.post("/api/leads", body).await;
        assert_eq!(status, StatusCode::CREATED, "{lead}");
        lead["id"].as_i64().unwrap()
    }
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let app = app().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");

    let (status, body) = app.get("/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_lead_crud() {
    let app = app().await;
    let id = app
        .create_lead(json!({
            "company_name": "Acme Analytics",
            "email": "ceo@acme.io",
            "industry": "Software",
            "city": "Denver"
        }))
        .await;

    let (status, lead) = app.get(&format!("/api/leads/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lead["company_name"], "Acme Analytics");
    assert_eq!(lead["status"], "new");

    let (status, lead) = app
        .put(&format!("/api/leads/{id}"), json!({ "status": "contacted" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lead["status"], "contacted");
    assert_eq!(lead["city"], "Denver");

    let (status, list) = app.get("/api/leads?limit=500").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["limit"], 100);
    assert_eq!(list["pagination"]["total"], 1);

    let (status, overview) = app.get("/api/leads/stats/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["totalLeads"], 1);

    let (status, body) = app.get("/api/leads/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid lead ID");

    let (status, _) = app.send(Method::DELETE, &format!("/api/leads/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.send(Method::DELETE, &format!("/api/leads/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Lead not found");
}

#[tokio::test]
async fn test_lead_requires_company_name() {
    let app = app().await;
    let (status, body) = app.post("/api/leads", json!({ "email": "a@b.io" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_dashboard_and_analytics() {
    let app = app().await;
    app.create_lead(json!({ "company_name": "Acme", "industry": "Software", "city": "Denver" }))
        .await;
    app.create_lead(json!({ "company_name": "Globex" })).await;

    let (status, overview) = app.get("/api/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["totalLeads"], 2);
    let industries = overview["industryDistribution"].as_array().unwrap();
    assert!(industries.iter().any(|i| i["industry"] == "unknown" && i["count"] == 1));

    let (status, actions) = app.get("/api/dashboard/quick-actions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(actions["newLeads"], 2);

    let (status, summary) = app.get("/api/analytics?timeRange=7d").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalLeads"], 2);
    assert_eq!(summary["timeRange"], "7d");

    let (status, geography) = app.get("/api/analytics/geography").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(geography["cities"][0], json!({ "city": "Denver", "count": 1 }));
}

#[tokio::test]
async fn test_settings_validation_and_merge() {
    let app = app().await;

    let (status, security) = app.get("/api/settings/security").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(security["sessionTimeout"], 24);

    let (status, body) = app
        .put("/api/settings/security", json!({ "sessionTimeout": 500 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Session timeout must be between 1 and 168 hours"
    );

    let (status, body) = app
        .put("/api/settings/security", json!({ "sessionTimeout": 48 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Security settings updated successfully");

    let (_, security) = app.get("/api/settings/security").await;
    assert_eq!(security["sessionTimeout"], 48);
    assert_eq!(security["maxLoginAttempts"], 5);

    // A bad section rejects the whole update.
    let (status, _) = app
        .put(
            "/api/settings",
            json!({
                "general": { "companyName": "LeadForge" },
                "emailMarketing": { "dailyLimit": 0 }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, all) = app.get("/api/settings").await;
    assert_eq!(all["general"]["companyName"], "Your Company");
    assert_eq!(all["emailMarketing"]["dailyLimit"], 200);
}

#[tokio::test]
async fn test_export_leads() {
    let app = app().await;
    let (status, body) = app.get("/api/export/leads").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "No leads found matching the specified filters"
    );

    app.create_lead(json!({ "company_name": "Acme, Inc.", "industry": "Software" }))
        .await;

    let response = app.request(Method::GET, "/api/export/leads", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"leads_"));
    assert!(disposition.ends_with(".csv\""));
    let csv = text(response).await;
    assert!(csv.starts_with("Company Name,First Name,Last Name,Email"));
    assert!(csv.contains("\"Acme, Inc.\""));

    let (status, rows) = app.get("/api/export/leads?format=json&industry=Software").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["Company Name"], "Acme, Inc.");

    let (status, body) = app.get("/api/export/campaigns").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Campaign ID is required");
}

#[tokio::test]
async fn test_database_admin() {
    let app = app().await;

    let (status, tables) = app.get("/api/database/tables").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tables["totalTables"], 10);

    let (status, _) = app.get("/api/database/tables/sqlite_master/schema").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, schema) = app.get("/api/database/tables/leads/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert!(schema["columns"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["name"] == "company_name"));

    app.create_lead(json!({ "company_name": "Acme" })).await;
    let (status, data) = app.get("/api/database/tables/leads/data?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data["data"][0]["company_name"], "Acme");
    assert_eq!(data["pagination"]["total"], 1);

    let (status, backup) = app.post("/api/database/backup", json!({})).await;
    assert_eq!(status, StatusCode::OK, "{backup}");
    assert!(backup["sizeBytes"].as_u64().unwrap() > 0);
    let path = std::path::PathBuf::from(backup["path"].as_str().unwrap());
    assert!(path.starts_with(app.backup_dir.path()));
    assert!(path.exists());

    let (status, health) = app.get("/api/database/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_rate_limit() {
    let app = app_with(|c| c.server.api_rate_limit_requests = 2).await;

    assert_eq!(app.get("/api/leads").await.0, StatusCode::OK);
    assert_eq!(app.get("/api/leads").await.0, StatusCode::OK);
    let (status, body) = app.get("/api/leads").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "rate_limited");

    // Outside /api is not limited.
    assert_eq!(app.get("/health").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_prospecting_routes() {
    let app = app().await;

    let (status, body) = app.post("/api/lead-prospecting/start", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid search criteria");

    let (status, started) = app
        .post(
            "/api/lead-prospecting/start",
            json!({ "industry": "Cafe", "city": "Denver" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "pending");
    let job_id = started["job_id"].as_i64().unwrap();

    let (status, job) = app.get(&format!("/api/lead-prospecting/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["job"]["search_criteria"]["city"], "Denver");

    let (status, jobs) = app.get("/api/lead-prospecting/jobs?date_from=2020-01-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(jobs["pagination"]["total"], 1);

    let (status, _) = app.get("/api/lead-prospecting/jobs?date_from=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/lead-prospecting/jobs/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, stats) = app.get("/api/lead-prospecting/email-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["success"], true);
}

#[tokio::test]
async fn test_web_scraping_routes() {
    let app = app().await;

    let (status, body) = app.post("/api/web-scraping/bulk-scrape", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Query parameter is required");

    let (status, body) = app
        .post(
            "/api/web-scraping/bulk-scrape",
            json!({ "query": "cafe", "sources": ["myspace"] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["source"], "myspace");

    let (status, body) = app
        .post("/api/web-scraping/scrape-source", json!({ "query": "cafe" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Source and query parameters are required");

    let (status, scraped) = app
        .post(
            "/api/web-scraping/scrape-source",
            json!({ "source": "yellowpages", "query": "cafe", "location": "Denver" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{scraped}");
    assert_eq!(scraped["results_count"], 3);
    assert_eq!(scraped["stored_leads"], 2);

    let (_, leads) = app.get("/api/leads").await;
    assert_eq!(leads["pagination"]["total"], 2);

    let (status, body) = app.post("/api/web-scraping/scrape-website", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Website URL is required");
}

#[tokio::test]
async fn test_smtp_and_template_validation() {
    let app = app().await;

    let (status, body) = app.post("/api/email-marketing/smtp", json!({ "port": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"].as_array().unwrap().len() >= 4);

    let account = json!({
        "name": "Outreach",
        "host": "bad.example.com",
        "port": 587,
        "username": "outreach@leadforge.io",
        "password": "secret",
        "encryption": "tls",
        "daily_limit": 50
    });
    let (status, body) = app.post("/api/email-marketing/smtp", account.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "SMTP connection failed");

    let mut good = account;
    good["host"] = json!("smtp.leadforge.io");
    let (status, created) = app.post("/api/email-marketing/smtp", good).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("password").is_none());
    assert_eq!(created["daily_limit"], 50);

    let (status, body) = app
        .post(
            "/api/email-marketing/templates",
            json!({ "name": "Intro", "subject": "Hi", "body": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"][0]["field"], "body");

    let (status, body) = app
        .post(
            "/api/email-marketing/campaigns",
            json!({ "name": "Spring", "template_id": 42 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Template not found");
}

async fn wait_for_campaign(app: &TestApp, id: i64) -> Value {
    for _ in 0..200 {
        let (_, campaign) = app.get(&format!("/api/email-marketing/campaigns/{id}")).await;
        if campaign["status"] == "completed" || campaign["status"] == "failed" {
            return campaign;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("campaign {id} did not finish");
}

#[tokio::test]
async fn test_campaign_send_track_and_reset() {
    let app = app().await;
    app.create_lead(json!({
        "company_name": "Acme",
        "first_name": "Ada",
        "email": "ada@acme.io",
        "industry": "Software"
    }))
    .await;
    app.create_lead(json!({ "company_name": "Globex", "industry": "Energy" }))
        .await;

    let (_, smtp) = app
        .post(
            "/api/email-marketing/smtp",
            json!({
                "name": "Outreach",
                "host": "smtp.leadforge.io",
                "port": 587,
                "username": "outreach@leadforge.io",
                "password": "secret",
                "daily_limit": 10
            }),
        )
        .await;
    let smtp_id = smtp["id"].as_i64().unwrap();

    let (status, template) = app
        .post(
            "/api/email-marketing/templates",
            json!({
                "name": "Intro",
                "subject": "Hello {{first_name}}",
                "body": "<p>Quick question for {{company_name}}.</p>"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let template_id = template["id"].as_i64().unwrap();

    let (status, campaign) = app
        .post(
            "/api/email-marketing/campaigns",
            json!({
                "name": "Software outreach",
                "template_id": template_id,
                "filters": { "industry": "Software" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(campaign["status"], "draft");
    let campaign_id = campaign["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/email-marketing/campaigns/{campaign_id}/send"),
            json!({ "smtp_credential_id": 999 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid SMTP credentials");

    let (status, started) = app
        .post(
            &format!("/api/email-marketing/campaigns/{campaign_id}/send"),
            json!({ "smtp_credential_id": smtp_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{started}");
    assert_eq!(started["recipientsCount"], 1);

    let finished = wait_for_campaign(&app, campaign_id).await;
    assert_eq!(finished["status"], "completed");
    assert_eq!(finished["emails_sent"], 1);
    assert_eq!(app.mailer.sent.lock().unwrap().len(), 1);
    let tracking_id = finished["recipients"][0]["tracking_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/email-marketing/track/{tracking_id}"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/gif");
    assert_eq!(
        response.headers()[CACHE_CONTROL],
        "no-cache, no-store, must-revalidate"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"GIF89a"));

    let report = text(
        app.request(
            Method::GET,
            &format!("/api/export/campaigns?campaignId={campaign_id}"),
            None,
        )
        .await,
    )
    .await;
    let row = report.lines().nth(1).unwrap();
    assert!(row.contains("ada@acme.io"));
    assert!(row.contains(",Yes,"));

    let (_, accounts) = app.get("/api/email-marketing/smtp").await;
    assert_eq!(accounts[0]["daily_sent"], 1);
    let (status, reset) = app
        .post("/api/email-marketing/reset-daily-limits", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["reset"], 1);
    let (_, accounts) = app.get("/api/email-marketing/smtp").await;
    assert_eq!(accounts[0]["daily_sent"], 0);
}

#[tokio::test]
async fn test_send_guards() {
    let app = app().await;
    let (_, smtp) = app
        .post(
            "/api/email-marketing/smtp",
            json!({
                "name": "Outreach",
                "host": "smtp.leadforge.io",
                "port": 465,
                "username": "outreach@leadforge.io",
                "password": "secret",
                "encryption": "ssl",
                "daily_limit": 10
            }),
        )
        .await;
    let smtp_id = smtp["id"].as_i64().unwrap();
    let (_, template) = app
        .post(
            "/api/email-marketing/templates",
            json!({ "name": "Intro", "subject": "Hi", "body": "Hello there, {{company_name}}" }),
        )
        .await;
    let (_, campaign) = app
        .post(
            "/api/email-marketing/campaigns",
            json!({ "name": "Nobody", "template_id": template["id"], "filters": { "industry": "Mining" } }),
        )
        .await;
    let campaign_id = campaign["id"].as_i64().unwrap();
    let send_uri = format!("/api/email-marketing/campaigns/{campaign_id}/send");

    let (status, body) = app.post(&send_uri, json!({ "smtp_credential_id": smtp_id })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "No leads found matching campaign filters");

    campaigns::set_status(app.db.pool(), campaign_id, CampaignStatus::Sending)
        .await
        .unwrap();
    let (status, _) = app.post(&send_uri, json!({ "smtp_credential_id": smtp_id })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A template used by a campaign cannot be deleted.
    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/email-marketing/templates/{}", template["id"]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/api/email-marketing/campaigns/999/send", json!({ "smtp_credential_id": smtp_id }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resend_after_quota_mails_each_lead_its_own_content() {
    let app = app().await;
    app.create_lead(json!({ "company_name": "Acme", "email": "ops@acme.io", "industry": "Software" }))
        .await;
    app.create_lead(json!({ "company_name": "Initech", "email": "ops@initech.io", "industry": "Software" }))
        .await;

    let (_, smtp) = app
        .post(
            "/api/email-marketing/smtp",
            json!({
                "name": "Tiny",
                "host": "smtp.leadforge.io",
                "port": 587,
                "username": "outreach@leadforge.io",
                "password": "secret",
                "daily_limit": 1
            }),
        )
        .await;
    let smtp_id = smtp["id"].as_i64().unwrap();
    let (_, template) = app
        .post(
            "/api/email-marketing/templates",
            json!({ "name": "Intro", "subject": "Hi", "body": "<p>Notes for {{company}}</p>" }),
        )
        .await;
    let (_, campaign) = app
        .post(
            "/api/email-marketing/campaigns",
            json!({ "name": "Software", "template_id": template["id"], "filters": { "industry": "Software" } }),
        )
        .await;
    let campaign_id = campaign["id"].as_i64().unwrap();
    let send_uri = format!("/api/email-marketing/campaigns/{campaign_id}/send");

    let (status, started) = app.post(&send_uri, json!({ "smtp_credential_id": smtp_id })).await;
    assert_eq!(status, StatusCode::OK, "{started}");
    assert_eq!(started["recipientsCount"], 2);
    wait_for_campaign(&app, campaign_id).await;

    let (status, _) = app.post("/api/email-marketing/reset-daily-limits", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, started) = app.post(&send_uri, json!({ "smtp_credential_id": smtp_id })).await;
    assert_eq!(status, StatusCode::OK, "{started}");
    assert_eq!(started["recipientsCount"], 2);
    let finished = wait_for_campaign(&app, campaign_id).await;

    let sent = app.mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    for email in &sent {
        let company = if email.to == "ops@acme.io" { "Acme" } else { "Initech" };
        assert!(email.html_body.contains(company), "{} got {}", email.to, email.html_body);
    }

    // One stale pending row from the first run was replaced, not re-sent.
    let recipients = finished["recipients"].as_array().unwrap();
    assert_eq!(recipients.len(), 3);
    let pending = recipients.iter().filter(|r| r["status"] == "pending").count();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn test_send_claim_is_exclusive() {
    let app = app().await;
    let template = leadforge_db::email_templates::create(
        app.db.pool(),
        &leadforge_db::email_templates::EmailTemplateInput {
            name: "Intro".to_string(),
            subject: "Hi".to_string(),
            body: "Hello there".to_string(),
            variables: vec![],
        },
    )
    .await
    .unwrap();
    let campaign = campaigns::create(
        app.db.pool(),
        &campaigns::NewCampaign {
            name: "Once".to_string(),
            template_id: template.id,
            filters: Default::default(),
        },
    )
    .await
    .unwrap();
    let (_, smtp) = app
        .post(
            "/api/email-marketing/smtp",
            json!({
                "name": "Outreach",
                "host": "smtp.leadforge.io",
                "port": 587,
                "username": "outreach@leadforge.io",
                "password": "secret"
            }),
        )
        .await;
    let smtp_id = smtp["id"].as_i64().unwrap();

    let (first, second) = tokio::join!(
        campaigns::start_sending(app.db.pool(), campaign.id, smtp_id),
        campaigns::start_sending(app.db.pool(), campaign.id, smtp_id),
    );
    assert_ne!(first.unwrap(), second.unwrap(), "exactly one claim wins");
}
