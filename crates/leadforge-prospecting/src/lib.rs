//! LeadForge Prospecting - background lead search jobs.
//!
//! A job combines fresh listings from the scraping engine with matching
//! leads already in the database, fills in missing emails through the
//! enricher and stores the result, reporting progress on the job row as it
//! goes. Clients follow a job by polling it or through
//! [`ProspectingOrchestrator::progress_events`].
//!
//! # Example
//!
//! ```rust,ignore
//! use leadforge_prospecting::{ProspectingOrchestrator, SearchCriteria};
//!
//! let orchestrator = ProspectingOrchestrator::new(db, scraper, enricher, config.prospecting);
//! let job_id = orchestrator
//!     .start_job(SearchCriteria {
//!         industry: Some("Software".into()),
//!         city: Some("Denver".into()),
//!         ..SearchCriteria::default()
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod criteria;
#[allow(missing_docs)]
pub mod error;
pub mod events;
pub mod orchestrator;

pub use criteria::SearchCriteria;
pub use error::{ProspectingError, Result};
pub use events::{ProgressEvent, ProgressKind};
pub use orchestrator::{
    scraped_lead_input, JobDebugInfo, JobStatistics, ProspectingOrchestrator, QualityDistribution,
    DEFAULT_SOURCE,
};
