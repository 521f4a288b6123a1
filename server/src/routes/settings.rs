//! `/api/settings`: application settings stored per section and merged over defaults.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use leadforge_core::{email_regex, AppConfig};
use leadforge_db::settings;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_all).put(update_all))
        .route(
            "/email-marketing",
            get(get_email_marketing).put(update_email_marketing),
        )
        .route(
            "/notifications",
            get(get_notifications).put(update_notifications),
        )
        .route("/security", get(get_security).put(update_security))
}

/// A settings section, stored under its camelCase key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    EmailMarketing,
    Notifications,
    Security,
    General,
}

impl Section {
    const ALL: [Self; 4] = [
        Self::EmailMarketing,
        Self::Notifications,
        Self::Security,
        Self::General,
    ];

    fn key(self) -> &'static str {
        match self {
            Self::EmailMarketing => "emailMarketing",
            Self::Notifications => "notifications",
            Self::Security => "security",
            Self::General => "general",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::EmailMarketing => "Email marketing",
            Self::Notifications => "Notification",
            Self::Security => "Security",
            Self::General => "General",
        }
    }

    fn defaults(self, config: &AppConfig) -> Value {
        match self {
            Self::EmailMarketing => {
                let mail = &config.email_marketing;
                json!({
                    "dailyLimit": mail.daily_limit,
                    "trackingEnabled": mail.tracking_enabled,
                    "maxRetries": mail.max_retries,
                    "defaultFromEmail": mail.default_from_email,
                    "defaultFromName": mail.default_from_name,
                })
            }
            Self::Notifications => json!({
                "emailNotifications": true,
                "slackNotifications": false,
                "slackWebhook": "",
                "notificationEmails": ["admin@yourcompany.com"],
                "notificationTypes": {
                    "newLead": true,
                    "campaignComplete": true,
                    "systemAlerts": true,
                    "dailyReports": false,
                },
            }),
            Self::Security => json!({
                "requireEmailVerification": false,
                "maxLoginAttempts": 5,
                "sessionTimeout": 24,
                "passwordMinLength": 8,
                "twoFactorAuth": false,
                "allowedIPs": [],
                "passwordPolicy": {
                    "requireUppercase": true,
                    "requireLowercase": true,
                    "requireNumbers": true,
                    "requireSpecialChars": true,
                },
            }),
            Self::General => json!({
                "companyName": "Your Company",
                "timezone": "UTC",
                "dateFormat": "MM/DD/YYYY",
                "currency": "USD",
            }),
        }
    }

    fn validate(self, patch: &Map<String, Value>) -> ApiResult<()> {
        match self {
            Self::EmailMarketing => {
                check_range(patch, "dailyLimit", 1, 1000, "Daily limit must be between 1 and 1000")?;
                check_range(patch, "maxRetries", 1, 10, "Max retries must be between 1 and 10")?;
                if let Some(from) = patch.get("defaultFromEmail").filter(|v| !v.is_null()) {
                    check_email(from)?;
                }
            }
            Self::Notifications => {
                if let Some(emails) = patch.get("notificationEmails").filter(|v| !v.is_null()) {
                    let emails = emails.as_array().ok_or_else(|| {
                        ApiError::bad_request("notificationEmails must be a list of email addresses")
                    })?;
                    emails.iter().try_for_each(check_email)?;
                }
            }
            Self::Security => {
                check_range(
                    patch,
                    "maxLoginAttempts",
                    1,
                    20,
                    "Max login attempts must be between 1 and 20",
                )?;
                check_range(
                    patch,
                    "sessionTimeout",
                    1,
                    168,
                    "Session timeout must be between 1 and 168 hours",
                )?;
                check_range(
                    patch,
                    "passwordMinLength",
                    6,
                    50,
                    "Password minimum length must be between 6 and 50",
                )?;
            }
            Self::General => {}
        }
        Ok(())
    }
}

/// A present, non-null `key` must be an integer in `min..=max`.
fn check_range(patch: &Map<String, Value>, key: &str, min: i64, max: i64, message: &str) -> ApiResult<()> {
    match patch.get(key) {
        None | Some(Value::Null) => Ok(()),
        Some(v) => match v.as_i64() {
            Some(n) if (min..=max).contains(&n) => Ok(()),
            _ => Err(ApiError::bad_request(message)),
        },
    }
}

fn check_email(value: &Value) -> ApiResult<()> {
    match value.as_str() {
        Some(email) if email_regex().is_match(email) => Ok(()),
        Some(email) => Err(ApiError::bad_request(format!("Invalid email address: {email}"))),
        None => Err(ApiError::bad_request(format!("Invalid email address: {value}"))),
    }
}

/// `overlay`'s keys replace those in `base`.
fn merge(base: Value, overlay: Option<&Value>) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Some(Value::Object(overlay))) => {
            for (k, v) in overlay {
                base.insert(k.clone(), v.clone());
            }
            Value::Object(base)
        }
        (base, _) => base,
    }
}

async fn load_section(state: &AppState, section: Section) -> ApiResult<Value> {
    let stored = settings::get_setting(state.db.pool(), section.key()).await?;
    Ok(merge(section.defaults(&state.config), stored.as_ref()))
}

/// Validate `patch` and merge it into the stored section.
async fn save_section(state: &AppState, section: Section, patch: &Value) -> ApiResult<DateTime<Utc>> {
    let fields = patch.as_object().ok_or_else(|| {
        ApiError::bad_request(format!("{} settings must be an object", section.title()))
    })?;
    section.validate(fields)?;

    let pool = state.db.pool();
    let stored = settings::get_setting(pool, section.key())
        .await?
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Map::new()));
    let updated = merge(stored, Some(patch));
    let updated_at = settings::set_setting(pool, section.key(), &updated).await?;
    tracing::info!(section = section.key(), "Settings updated");
    Ok(updated_at)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Updated {
    message: String,
    updated_at: DateTime<Utc>,
}

async fn get_all(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut all = Map::new();
    for section in Section::ALL {
        all.insert(section.key().to_string(), load_section(&state, section).await?);
    }
    Ok(Json(Value::Object(all)))
}

async fn update_all(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Updated>> {
    let Json(body) = body?;
    let body = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Settings must be an object"))?;

    let present: Vec<(Section, &Value)> = Section::ALL
        .into_iter()
        .filter_map(|s| body.get(s.key()).filter(|v| !v.is_null()).map(|v| (s, v)))
        .collect();
    // Validate everything before writing anything.
    for (section, patch) in &present {
        let fields = patch.as_object().ok_or_else(|| {
            ApiError::bad_request(format!("{} settings must be an object", section.title()))
        })?;
        section.validate(fields)?;
    }

    let mut updated_at = Utc::now();
    for (section, patch) in present {
        updated_at = save_section(&state, section, patch).await?;
    }
    Ok(Json(Updated {
        message: "Settings updated successfully".to_string(),
        updated_at,
    }))
}

async fn get_section(state: &AppState, section: Section) -> ApiResult<Json<Value>> {
    load_section(state, section).await.map(Json)
}

async fn update_section(
    state: &AppState,
    section: Section,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Updated>> {
    let Json(patch) = body?;
    let updated_at = save_section(state, section, &patch).await?;
    Ok(Json(Updated {
        message: format!("{} settings updated successfully", section.title()),
        updated_at,
    }))
}

async fn get_email_marketing(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    get_section(&state, Section::EmailMarketing).await
}

async fn update_email_marketing(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Updated>> {
    update_section(&state, Section::EmailMarketing, body).await
}

async fn get_notifications(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    get_section(&state, Section::Notifications).await
}

async fn update_notifications(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Updated>> {
    update_section(&state, Section::Notifications, body).await
}

async fn get_security(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    get_section(&state, Section::Security).await
}

async fn update_security(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Updated>> {
    update_section(&state, Section::Security, body).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_ranges() {
        let security = Section::Security;
        assert!(security.validate(&fields(json!({ "sessionTimeout": 168 }))).is_ok());
        let err = security
            .validate(&fields(json!({ "sessionTimeout": 200 })))
            .unwrap_err();
        assert_eq!(err.message, "Session timeout must be between 1 and 168 hours");
        let err = security
            .validate(&fields(json!({ "passwordMinLength": "eight" })))
            .unwrap_err();
        assert_eq!(err.message, "Password minimum length must be between 6 and 50");

        let err = Section::EmailMarketing
            .validate(&fields(json!({ "dailyLimit": 0 })))
            .unwrap_err();
        assert_eq!(err.message, "Daily limit must be between 1 and 1000");
    }

    #[test]
    fn test_notification_emails() {
        let ok = json!({ "notificationEmails": ["ops@leadforge.io"] });
        assert!(Section::Notifications.validate(&fields(ok)).is_ok());

        let bad = json!({ "notificationEmails": ["ops@leadforge.io", "not-an-email"] });
        let err = Section::Notifications.validate(&fields(bad)).unwrap_err();
        assert_eq!(err.message, "Invalid email address: not-an-email");
    }

    #[test]
    fn test_merge_is_shallow() {
        let merged = merge(
            json!({ "a": 1, "nested": { "x": 1, "y": 2 } }),
            Some(&json!({ "nested": { "x": 5 }, "b": true })),
        );
        assert_eq!(merged, json!({ "a": 1, "b": true, "nested": { "x": 5 } }));
    }

    #[test]
    fn test_email_defaults_follow_config() {
        let mut config = AppConfig::default();
        config.email_marketing.daily_limit = 50;
        let defaults = Section::EmailMarketing.defaults(&config);
        assert_eq!(defaults["dailyLimit"], 50);
    }
}
