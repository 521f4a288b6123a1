//! LeadForge Scraper - business listings from public directories.
//!
//! Each [`Source`] carries a [`SourceDefinition`]: how to build its search
//! URL and which CSS selectors locate a listing and its fields. The
//! [`ScrapingEngine`] fetches result pages through a
//! [`leadforge_browser::PageFetcher`], parses them with [`ResultParser`],
//! and turns the listings into deduplicated, scored [`ScrapedLead`]s.
//! Company websites are read over plain HTTP by [`WebsiteScraper`].
//!
//! # Example
//!
//! ```rust,ignore
//! use leadforge_scraper::{ScrapingEngine, Source};
//!
//! let engine = ScrapingEngine::new(fetcher, &config.scraping)?;
//! let bulk = engine.bulk_scrape("plumbers", "Denver, CO", &[Source::Yelp]).await;
//! let leads = engine.scrape_leads("plumbers", "Denver, CO", 50).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod engine;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod parser;
pub mod sources;
pub mod website;

pub use engine::{
    dedup_key, dedup_leads, email_patterns, enrich_lead, filter_by_criteria, quality_score,
    BulkScrapeResult, ScrapedLead, ScrapingEngine,
};
pub use error::{Result, ScrapeError};
pub use parser::{ResultParser, ScrapedBusiness};
pub use sources::{Field, FieldSelector, Source, SourceDefinition};
pub use website::{contact_page_urls, extract_contact_info, ContactInfo, WebsiteScraper};
