//! LeadForge Enrichment - email discovery for scraped leads.
//!
//! Candidate addresses are generated from a company's domain, then each
//! domain is checked for MX records and basic reachability through a
//! [`DomainVerifier`]. Candidates are scored and the best one becomes the
//! lead's `best_email`.
//!
//! # Example
//!
//! ```rust,ignore
//! use leadforge_enrichment::{DnsDomainVerifier, EmailEnricher, LeadProfile};
//! use std::sync::Arc;
//!
//! let verifier = Arc::new(DnsDomainVerifier::new(&config.enrichment));
//! let enricher = EmailEnricher::new(verifier, config.enrichment.clone());
//! let result = enricher
//!     .enrich_lead(&LeadProfile {
//!         company_name: "Acme".into(),
//!         website: Some("https://acme.com".into()),
//!         ..LeadProfile::default()
//!     })
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod domain;
pub mod enricher;
pub mod error;
pub mod generator;
pub mod verifier;

pub use domain::{email_domain, extract_domain, website_host};
pub use enricher::{
    best_email, fallback_email, CompanyEmails, CompanyRef, EmailEnricher, EmailVerification,
    LeadEmails, LeadProfile,
};
pub use error::{EnrichmentError, Result};
pub use generator::{generate_emails, generate_person_patterns, GeneratedEmail};
pub use verifier::{
    score_email, validate_email_format, DnsDomainVerifier, DomainVerification, DomainVerifier,
};
