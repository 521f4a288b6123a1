//! API error responses.
//!
//! Every failing handler returns an [`ApiError`], rendered as
//! `{"error": {"code", "message", "details"?}}` with a matching status.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leadforge_db::DatabaseError;
use leadforge_mail::MailError;
use leadforge_prospecting::ProspectingError;
use leadforge_scraper::ScrapeError;
use serde::Serialize;
use serde_json::Value;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An error with its HTTP status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Response status
    pub status: StatusCode,
    /// Machine-readable code, e.g. `not_found`
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Extra context such as per-field validation errors
    pub details: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

#[allow(missing_docs)]
impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limited", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
    }

    /// A 500 whose cause is logged but not returned.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal server error: {}", cause);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: &self.code,
                message: &self.message,
                details: self.details.as_ref(),
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => Self::not_found("Record not found"),
            DatabaseError::NotFoundWithMessage(message) => Self::not_found(message),
            DatabaseError::Invalid(message) => Self::bad_request(message),
            DatabaseError::Conflict(message) => Self::conflict(message),
            other => Self::internal(other),
        }
    }
}

impl From<ProspectingError> for ApiError {
    fn from(err: ProspectingError) -> Self {
        match err {
            ProspectingError::InvalidCriteria(message) => {
                Self::bad_request("Invalid search criteria")
                    .with_details(serde_json::json!({ "reason": message }))
            }
            ProspectingError::JobNotFound(_) => Self::not_found("Job not found"),
            ProspectingError::JobConflict(message) => Self::conflict(message),
            ProspectingError::Database(e) => e.into(),
            ProspectingError::Serialization(e) => Self::internal(e),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::Connection(reason) => Self::bad_request("SMTP connection failed")
                .with_details(serde_json::json!({ "reason": reason })),
            e @ (MailError::InvalidAddress { .. } | MailError::Build(_)) => {
                Self::bad_request(e.to_string())
            }
            MailError::Send(reason) => Self::bad_gateway(format!("SMTP send failed: {reason}")),
            MailError::Database(e) => e.into(),
        }
    }
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::UnknownSource(source) => Self::bad_request("Invalid source specified")
                .with_details(serde_json::json!({ "source": source })),
            ScrapeError::InvalidUrl(message) => Self::bad_request(format!("Invalid URL: {message}")),
            other => Self::bad_gateway(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Parse a numeric path id. `what` names the entity in the error message.
pub fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {what} ID")))
}
