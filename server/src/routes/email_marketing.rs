//! `/api/email-marketing`: SMTP accounts, templates, campaigns, sending and
//! open tracking.

use crate::error::{parse_id, ApiError, ApiResult};
use crate::rate_limit::client_ip;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA, USER_AGENT};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use leadforge_db::campaigns::{
    self, Campaign, CampaignRecipient, CampaignStatus, CampaignWithStats, NewCampaign,
};
use leadforge_db::email_templates::{self, EmailTemplate, EmailTemplateInput};
use leadforge_db::leads::{self, LeadFilter};
use leadforge_db::smtp_credentials::{self, SmtpCredential, SmtpCredentialInput, SmtpEncryption};
use leadforge_mail::{extract_variables, CampaignRunner, Delivery, SmtpSettings, TRACKING_PIXEL_GIF};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const MIN_BODY_LEN: usize = 10;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/smtp", get(list_smtp).post(create_smtp))
        .route("/smtp/{id}", put(update_smtp).delete(delete_smtp))
        .route("/templates", get(list_templates).post(create_template))
        .route(
            "/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/{id}", get(get_campaign))
        .route("/campaigns/{id}/send", post(send_campaign))
        .route("/track/{tracking_id}", get(track_open))
        .route("/reset-daily-limits", post(reset_daily_limits))
}

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct FieldError {
    field: &'static str,
    message: &'static str,
}

/// Collects field errors; rejects with 400 and the full list if any.
#[derive(Debug, Default)]
struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    fn check(&mut self, ok: bool, field: &'static str, message: &'static str) {
        if !ok {
            self.errors.push(FieldError { field, message });
        }
    }

    fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ApiError::bad_request("Validation failed").with_details(json!(self.errors)))
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

// ============ SMTP accounts ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SmtpRequest {
    name: Option<String>,
    host: Option<String>,
    port: Option<i64>,
    username: Option<String>,
    password: Option<String>,
    encryption: Option<String>,
    #[serde(alias = "dailyLimit")]
    daily_limit: Option<i64>,
}

impl SmtpRequest {
    fn validate(self, default_daily_limit: i64) -> ApiResult<SmtpCredentialInput> {
        let name = trimmed(self.name);
        let host = trimmed(self.host);
        let username = trimmed(self.username);
        let password = self.password.unwrap_or_default();
        let encryption = match self.encryption.as_deref().map(str::trim) {
            None | Some("") => Some(SmtpEncryption::default()),
            Some(other) => SmtpEncryption::parse(other),
        };
        let port = self.port.and_then(|p| u16::try_from(p).ok()).filter(|p| *p > 0);
        let daily_limit = self.daily_limit.unwrap_or(default_daily_limit);

        let mut v = Validator::default();
        v.check(!name.is_empty(), "name", "Name is required");
        v.check(!host.is_empty(), "host", "Host is required");
        v.check(port.is_some(), "port", "Port must be between 1 and 65535");
        v.check(!username.is_empty(), "username", "Username is required");
        v.check(!password.trim().is_empty(), "password", "Password is required");
        v.check(
            encryption.is_some(),
            "encryption",
            "Encryption must be none, ssl, or tls",
        );
        v.check(
            (1..=1000).contains(&daily_limit),
            "daily_limit",
            "Daily limit must be between 1 and 1000",
        );
        v.finish()?;

        Ok(SmtpCredentialInput {
            name,
            host,
            port: port.unwrap_or_default(),
            username,
            password,
            encryption: encryption.unwrap_or_default(),
            daily_limit,
        })
    }
}

/// Parse the body and check the account accepts a login before storing it.
async fn verified_smtp_input(
    state: &AppState,
    body: Result<Json<SmtpRequest>, JsonRejection>,
) -> ApiResult<SmtpCredentialInput> {
    let Json(request) = body?;
    let input = request.validate(i64::from(state.config.email_marketing.daily_limit))?;
    state.mailer.verify(&SmtpSettings::from(&input)).await?;
    Ok(input)
}

async fn list_smtp(State(state): State<AppState>) -> ApiResult<Json<Vec<SmtpCredential>>> {
    Ok(Json(smtp_credentials::list(state.db.pool()).await?))
}

async fn create_smtp(
    State(state): State<AppState>,
    body: Result<Json<SmtpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SmtpCredential>)> {
    let input = verified_smtp_input(&state, body).await?;
    let credential = smtp_credentials::create(state.db.pool(), &input).await?;
    tracing::info!(target: "campaign", smtp_id = credential.id, host = %credential.host, "SMTP account added");
    Ok((StatusCode::CREATED, Json(credential)))
}

async fn update_smtp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SmtpRequest>, JsonRejection>,
) -> ApiResult<Json<SmtpCredential>> {
    let id = parse_id(&id, "SMTP credential")?;
    let input = verified_smtp_input(&state, body).await?;
    smtp_credentials::update(state.db.pool(), id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("SMTP credentials not found"))
}

async fn delete_smtp(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "SMTP credential")?;
    if !smtp_credentials::delete(state.db.pool(), id).await? {
        return Err(ApiError::not_found("SMTP credentials not found"));
    }
    Ok(Json(json!({ "message": "SMTP credentials deleted successfully" })))
}

// ============ Templates ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplateRequest {
    name: Option<String>,
    subject: Option<String>,
    body: Option<String>,
}

impl TemplateRequest {
    fn validate(self) -> ApiResult<EmailTemplateInput> {
        let name = trimmed(self.name);
        let subject = trimmed(self.subject);
        let body = self.body.unwrap_or_default();

        let mut v = Validator::default();
        v.check(!name.is_empty(), "name", "Template name is required");
        v.check(!subject.is_empty(), "subject", "Subject is required");
        v.check(
            body.trim().chars().count() >= MIN_BODY_LEN,
            "body",
            "Body must be at least 10 characters",
        );
        v.finish()?;

        let variables = extract_variables(&format!("{subject}\n{body}"));
        Ok(EmailTemplateInput {
            name,
            subject,
            body,
            variables,
        })
    }
}

async fn list_templates(State(state): State<AppState>) -> ApiResult<Json<Vec<EmailTemplate>>> {
    Ok(Json(email_templates::list(state.db.pool()).await?))
}

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<EmailTemplate>> {
    let id = parse_id(&id, "template")?;
    email_templates::get(state.db.pool(), id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Template not found"))
}

async fn create_template(
    State(state): State<AppState>,
    body: Result<Json<TemplateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmailTemplate>)> {
    let Json(request) = body?;
    let input = request.validate()?;
    let template = email_templates::create(state.db.pool(), &input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<TemplateRequest>, JsonRejection>,
) -> ApiResult<Json<EmailTemplate>> {
    let id = parse_id(&id, "template")?;
    let Json(request) = body?;
    let input = request.validate()?;
    email_templates::update(state.db.pool(), id, &input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Template not found"))
}

async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "template")?;
    if !email_templates::delete(state.db.pool(), id).await? {
        return Err(ApiError::not_found("Template not found"));
    }
    Ok(Json(json!({ "message": "Template deleted successfully" })))
}

// ============ Campaigns ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CampaignRequest {
    name: Option<String>,
    #[serde(alias = "templateId")]
    template_id: Option<i64>,
    filters: Option<LeadFilter>,
}

async fn list_campaigns(State(state): State<AppState>) -> ApiResult<Json<Vec<CampaignWithStats>>> {
    Ok(Json(campaigns::list_with_stats(state.db.pool()).await?))
}

async fn create_campaign(
    State(state): State<AppState>,
    body: Result<Json<CampaignRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let Json(request) = body?;
    let name = trimmed(request.name);
    let template_id = request.template_id.filter(|id| *id >= 1);

    let mut v = Validator::default();
    v.check(!name.is_empty(), "name", "Campaign name is required");
    v.check(template_id.is_some(), "template_id", "Template ID is required");
    v.finish()?;
    let template_id = template_id.unwrap_or_default();

    let pool = state.db.pool();
    if email_templates::get(pool, template_id).await?.is_none() {
        return Err(ApiError::bad_request("Template not found"));
    }

    let campaign = campaigns::create(
        pool,
        &NewCampaign {
            name,
            template_id,
            filters: request.filters.unwrap_or_default(),
        },
    )
    .await?;
    tracing::info!(target: "campaign", campaign_id = campaign.id, "Campaign created");
    Ok((StatusCode::CREATED, Json(campaign)))
}

#[derive(Serialize)]
struct CampaignDetail {
    #[serde(flatten)]
    campaign: Campaign,
    template: Option<EmailTemplate>,
    smtp_credential: Option<SmtpCredential>,
    recipients: Vec<CampaignRecipient>,
}

async fn get_campaign(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<CampaignDetail>> {
    let id = parse_id(&id, "campaign")?;
    let pool = state.db.pool();
    let campaign = campaigns::get(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))?;

    let template = email_templates::get(pool, campaign.template_id).await?;
    let smtp_credential = match campaign.smtp_credential_id {
        Some(smtp_id) => smtp_credentials::get(pool, smtp_id).await?,
        None => None,
    };
    let recipients = campaigns::list_recipients(pool, id).await?;
    Ok(Json(CampaignDetail {
        campaign,
        template,
        smtp_credential,
        recipients,
    }))
}

// ============ POST /campaigns/{id}/send ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendRequest {
    #[serde(alias = "smtpCredentialId")]
    smtp_credential_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendStarted {
    message: &'static str,
    recipients_count: usize,
    campaign_id: i64,
}

async fn send_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> ApiResult<Json<SendStarted>> {
    let id = parse_id(&id, "campaign")?;
    let Json(request) = body?;
    let pool = state.db.pool();

    let campaign = campaigns::get(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign not found"))?;
    if campaign.status == CampaignStatus::Sending {
        return Err(ApiError::conflict("Campaign is already sending"));
    }

    let smtp_id = request
        .smtp_credential_id
        .ok_or_else(|| ApiError::bad_request("SMTP credential ID is required"))?;
    let smtp = smtp_credentials::get(pool, smtp_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid SMTP credentials"))?;
    if smtp.remaining_today() == 0 {
        return Err(ApiError::bad_request(
            "Daily sending limit reached for this SMTP account",
        ));
    }

    let template = email_templates::get(pool, campaign.template_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Campaign template not found"))?;

    let targets = leads::find_for_campaign(pool, &campaign.filters).await?;
    if targets.is_empty() {
        return Err(ApiError::bad_request("No leads found matching campaign filters"));
    }

    // Claim before queueing so a concurrent send cannot queue a second batch.
    if !campaigns::start_sending(pool, id, smtp.id).await? {
        return Err(ApiError::conflict("Campaign is already sending"));
    }

    let queued: Vec<(i64, Option<String>)> =
        targets.iter().map(|l| (l.id, l.email.clone())).collect();
    let recipients = match campaigns::add_recipients(pool, id, &queued).await {
        Ok(recipients) => recipients,
        Err(e) => {
            campaigns::fail(pool, id, &e.to_string()).await?;
            return Err(e.into());
        }
    };
    let deliveries = Delivery::pair(recipients, targets);
    let recipients_count = deliveries.len();
    tracing::info!(target: "campaign", campaign_id = id, recipients_count, "Campaign sending started");

    let runner = CampaignRunner::new(
        Arc::clone(&state.db),
        Arc::clone(&state.mailer),
        state.config.email_marketing.clone(),
        state.config.server.backend_url.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = runner.run(id, &template, &smtp, &deliveries).await {
            tracing::error!(target: "campaign", campaign_id = id, "Campaign run aborted: {}", e);
        }
    });

    Ok(Json(SendStarted {
        message: "Campaign started successfully",
        recipients_count,
        campaign_id: id,
    }))
}

// ============ GET /track/{tracking_id} ============

/// Record an open and answer with a 1x1 GIF. Never fails.
async fn track_open(
    State(state): State<AppState>,
    Path(tracking_id): Path<String>,
    request: Request,
) -> impl IntoResponse {
    let ip = client_ip(&request);
    let ip = (!ip.is_unspecified()).then(|| ip.to_string());
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    if let Err(e) = campaigns::record_open(
        state.db.pool(),
        &tracking_id,
        ip.as_deref(),
        user_agent.as_deref(),
    )
    .await
    {
        tracing::warn!(target: "campaign", %tracking_id, "Failed to record email open: {}", e);
    }

    (
        [
            (CONTENT_TYPE, "image/gif"),
            (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (PRAGMA, "no-cache"),
            (EXPIRES, "0"),
        ],
        TRACKING_PIXEL_GIF,
    )
}

// ============ POST /reset-daily-limits ============

async fn reset_daily_limits(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let reset = smtp_credentials::reset_daily_limits(state.db.pool()).await?;
    Ok(Json(json!({
        "message": "Daily limits reset successfully",
        "reset": reset,
    })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_request_collects_every_error() {
        let err = SmtpRequest {
            port: Some(70_000),
            encryption: Some("starttls".into()),
            daily_limit: Some(5000),
            ..SmtpRequest::default()
        }
        .validate(200)
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let fields: Vec<&str> = err.details.as_ref().unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(
            fields,
            ["name", "host", "port", "username", "password", "encryption", "daily_limit"]
        );
    }

    #[test]
    fn test_smtp_request_defaults() {
        let input = SmtpRequest {
            name: Some(" Primary ".into()),
            host: Some("smtp.leadforge.io".into()),
            port: Some(587),
            username: Some("outreach@leadforge.io".into()),
            password: Some("secret".into()),
            ..SmtpRequest::default()
        }
        .validate(150)
        .unwrap();

        assert_eq!(input.name, "Primary");
        assert_eq!(input.encryption, SmtpEncryption::Tls);
        assert_eq!(input.daily_limit, 150);
    }

    #[test]
    fn test_template_variables_include_subject() {
        let input = TemplateRequest {
            name: Some("Intro".into()),
            subject: Some("Hello {{company_name}}".into()),
            body: Some("Hi {{first_name}}, quick question about {{company_name}}.".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(input.variables, ["company_name", "first_name"]);
    }

    #[test]
    fn test_template_body_too_short() {
        let err = TemplateRequest {
            name: Some("Intro".into()),
            subject: Some("Hi".into()),
            body: Some("   short  ".into()),
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.details, Some(json!([{ "field": "body", "message": "Body must be at least 10 characters" }])));
    }
}
