//! Progress events streamed to clients watching a job.

use chrono::{DateTime, Utc};
use leadforge_core::{JobStatus, ProspectingStep};
use leadforge_db::prospecting_jobs::ProspectingJob;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Event payload, tagged with `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Stream opened
    Connected {
        /// Watched job
        job_id: i64,
    },
    /// Job still running
    Progress {
        /// Current status
        status: JobStatus,
        /// Percentage
        progress: u8,
        /// Current step
        step: ProspectingStep,
        /// `Job status: <status>`
        message: String,
    },
    /// Job completed
    Complete {
        /// Leads stored
        total_leads: i64,
        /// Final statistics
        statistics: JsonValue,
    },
    /// Job failed, was cancelled or does not exist
    Error {
        /// Reason
        message: String,
    },
}

/// A timestamped progress event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Payload
    #[serde(flatten)]
    pub kind: ProgressKind,
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    fn new(kind: ProgressKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// First event of every stream.
    #[must_use]
    pub fn connected(job_id: i64) -> Self {
        Self::new(ProgressKind::Connected { job_id })
    }

    /// Error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ProgressKind::Error {
            message: message.into(),
        })
    }

    /// Event describing a job's current state.
    #[must_use]
    pub fn from_job(job: &ProspectingJob) -> Self {
        match job.status {
            JobStatus::Completed => Self::new(ProgressKind::Complete {
                total_leads: job.total_leads,
                statistics: job.statistics.clone().unwrap_or(JsonValue::Null),
            }),
            JobStatus::Failed => Self::error(
                job.error_message
                    .clone()
                    .unwrap_or_else(|| "Job failed".to_string()),
            ),
            JobStatus::Cancelled => Self::error("Job was cancelled"),
            status @ (JobStatus::Pending | JobStatus::Processing) => {
                Self::new(ProgressKind::Progress {
                    status,
                    progress: job.progress,
                    step: job.current_step,
                    message: format!("Job status: {status}"),
                })
            }
        }
    }

    /// SSE event name.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            ProgressKind::Connected { .. } => "connected",
            ProgressKind::Progress { .. } => "progress",
            ProgressKind::Complete { .. } => "complete",
            ProgressKind::Error { .. } => "error",
        }
    }

    /// Whether the stream ends after this event.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(
            self.kind,
            ProgressKind::Complete { .. } | ProgressKind::Error { .. }
        )
    }
}
