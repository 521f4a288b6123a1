//! LeadForge Browser - headless Chromium for JavaScript-heavy lead sources.
//!
//! Every navigation first takes a token from a per-domain
//! [`DomainRateLimiter`], and every page gets a fresh random fingerprint.
//! Scrapers depend on the [`PageFetcher`] trait rather than the engine so
//! they can be tested against canned HTML.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod rate_limit;

pub use actions::{extract_domain, PageFetcher};
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use fingerprint::{random_user_agent, FingerprintConfig, ProxyRotator, USER_AGENTS};
pub use rate_limit::{DomainLimit, DomainRateLimiter, DEFAULT_LIMITED_DOMAINS};
