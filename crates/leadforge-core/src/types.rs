//! Shared types used across LeadForge.
//!
//! Status enums are persisted as lowercase strings, so each one pairs a
//! `Display` impl with a forgiving `parse` that maps unknown values to a
//! documented fallback instead of failing a whole query.

use crate::error::LeadforgeError;
use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Loose email syntax check shared by settings validation and enrichment.
#[must_use]
pub fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

/// Sales pipeline status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    /// Not yet contacted
    #[default]
    New,
    /// At least one outreach attempt made
    Contacted,
    /// Replied with interest
    Interested,
    /// Deal closed
    Closed,
}

impl LeadStatus {
    /// All statuses in pipeline order.
    pub const ALL: [Self; 4] = [Self::New, Self::Contacted, Self::Interested, Self::Closed];

    /// Parse from string representation. Unknown values map to `New`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "contacted" => Self::Contacted,
            "interested" => Self::Interested,
            "closed" => Self::Closed,
            _ => Self::New,
        }
    }

    /// Lowercase storage form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Interested => "interested",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Follow-up priority of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority
    Low,
    /// Default priority
    #[default]
    Medium,
    /// High priority
    High,
}

impl Priority {
    /// Parse from string representation. Unknown values map to `Medium`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Lifecycle status of a background job (prospecting or scraping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet picked up
    Pending,
    /// Pipeline running
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Stopped on request
    Cancelled,
}

impl JobStatus {
    /// Parse from string representation.
    ///
    /// `started` and `running` are accepted as aliases of `Processing`;
    /// anything else unknown maps to `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "processing" | "started" | "running" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Whether the job can no longer change state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job counts as active in statistics.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Pipeline stage of a prospecting job. Each stage has a fixed progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectingStep {
    /// Job created, nothing done yet
    Initializing,
    /// Collecting leads from external sources and the database
    Scraping,
    /// Generating and verifying emails
    EmailEnrichment,
    /// Writing leads and emails
    Storing,
    /// Computing statistics
    Finalizing,
    /// Done
    Completed,
}

impl ProspectingStep {
    /// Progress percentage reported while the job is at this step.
    #[must_use]
    pub fn progress(&self) -> u8 {
        match self {
            Self::Initializing => 0,
            Self::Scraping => 25,
            Self::EmailEnrichment => 50,
            Self::Storing => 75,
            Self::Finalizing => 90,
            Self::Completed => 100,
        }
    }

    /// Parse from string representation. Unknown values map to `Initializing`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "scraping" => Self::Scraping,
            "email_enrichment" => Self::EmailEnrichment,
            "storing" => Self::Storing,
            "finalizing" => Self::Finalizing,
            "completed" => Self::Completed,
            _ => Self::Initializing,
        }
    }
}

impl fmt::Display for ProspectingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Scraping => "scraping",
            Self::EmailEnrichment => "email_enrichment",
            Self::Storing => "storing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Reporting window selected with `?timeRange=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeRange {
    /// Last 7 days
    #[serde(rename = "7d")]
    Week,
    /// Last 30 days
    #[serde(rename = "30d")]
    #[default]
    Month,
    /// Last 90 days
    #[serde(rename = "90d")]
    Quarter,
    /// Last calendar year
    #[serde(rename = "1y")]
    Year,
}

impl TimeRange {
    /// Parse a query value, falling back to the 30 day default.
    #[must_use]
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    /// Approximate length in days.
    #[must_use]
    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }

    /// First instant inside the window ending at `now`.
    #[must_use]
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Year => now
                .checked_sub_months(Months::new(12))
                .unwrap_or(now - Duration::days(365)),
            other => now - Duration::days(other.days()),
        }
    }

    /// Query-string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
            Self::Year => "1y",
        }
    }
}

impl FromStr for TimeRange {
    type Err = LeadforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            "1y" => Ok(Self::Year),
            other => Err(LeadforgeError::Validation(format!(
                "invalid time range '{other}': expected 7d, 30d, 90d or 1y"
            ))),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lead_status_round_trip_and_fallback() {
        for status in LeadStatus::ALL {
            assert_eq!(LeadStatus::parse(&status.to_string()), status);
        }
        assert_eq!(LeadStatus::parse("Interested"), LeadStatus::Interested);
        assert_eq!(LeadStatus::parse("archived"), LeadStatus::New);
    }

    #[test]
    fn test_job_status_aliases() {
        assert_eq!(JobStatus::parse("started"), JobStatus::Processing);
        assert_eq!(JobStatus::parse("cancelled"), JobStatus::Cancelled);
        assert_eq!(JobStatus::parse("???"), JobStatus::Pending);
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Pending.is_active());
    }

    #[test]
    fn test_prospecting_step_progress_is_monotonic() {
        let steps = [
            ProspectingStep::Initializing,
            ProspectingStep::Scraping,
            ProspectingStep::EmailEnrichment,
            ProspectingStep::Storing,
            ProspectingStep::Finalizing,
            ProspectingStep::Completed,
        ];
        let progress: Vec<u8> = steps.iter().map(ProspectingStep::progress).collect();
        assert_eq!(progress, vec![0, 25, 50, 75, 90, 100]);
        for step in steps {
            assert_eq!(ProspectingStep::parse(&step.to_string()), step);
        }
    }

    #[test]
    fn test_time_range_parsing() {
        assert_eq!("90d".parse::<TimeRange>().expect("parse"), TimeRange::Quarter);
        assert!("2w".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::parse_or_default(Some("2w")), TimeRange::Month);
        assert_eq!(TimeRange::parse_or_default(None), TimeRange::Month);
    }

    #[test]
    fn test_time_range_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            TimeRange::Week.start_from(now),
            Utc.with_ymd_and_hms(2026, 3, 24, 12, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::Year.start_from(now),
            Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_email_regex() {
        let re = email_regex();
        assert!(re.is_match("info@acme.com"));
        assert!(!re.is_match("info@acme"));
        assert!(!re.is_match("in fo@acme.com"));
    }

    #[test]
    fn test_enum_serialization() {
        let json = serde_json::to_string(&ProspectingStep::EmailEnrichment).expect("serialize");
        assert_eq!(json, "\"email_enrichment\"");
        let json = serde_json::to_string(&TimeRange::Year).expect("serialize");
        assert_eq!(json, "\"1y\"");
    }
}
