//! Multi-source scraping, deduplication and lead scoring.

use crate::error::Result;
use crate::parser::{ResultParser, ScrapedBusiness};
use crate::sources::Source;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use leadforge_browser::PageFetcher;
use leadforge_core::ScrapingConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Results of scraping several sources for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkScrapeResult {
    /// Listings per requested source
    #[serde(flatten)]
    pub results: BTreeMap<Source, Vec<ScrapedBusiness>>,
    /// Listings across all sources
    pub total_results: usize,
    /// When scraping finished
    pub scraped_at: DateTime<Utc>,
}

impl BulkScrapeResult {
    /// All listings, source by source.
    pub fn businesses(&self) -> impl Iterator<Item = &ScrapedBusiness> {
        self.results.values().flatten()
    }
}

/// A scraped listing normalized into a lead candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedLead {
    /// Company name
    pub company_name: String,
    /// Company website
    pub website: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// Industry, or the listing category when none is given
    pub industry: Option<String>,
    /// Description
    pub description: Option<String>,
    /// Raw location text
    pub location: Option<String>,
    /// City parsed from the location
    pub city: Option<String>,
    /// State parsed from the location
    pub state: Option<String>,
    /// Company size
    pub company_size: Option<String>,
    /// Funding summary
    pub total_funding: Option<String>,
    /// Rating text
    pub rating: Option<String>,
    /// Source name
    pub source: String,
    /// When the listing was read
    pub scraped_at: DateTime<Utc>,
    /// Website host without `www.`
    pub domain: Option<String>,
    /// Likely address patterns at `domain`
    pub email_patterns: Vec<String>,
    /// Completeness score in `[0, 1]`
    pub quality_score: f64,
}

impl From<ScrapedBusiness> for ScrapedLead {
    fn from(b: ScrapedBusiness) -> Self {
        let (city, state) = b
            .location
            .as_deref()
            .map_or((None, None), split_location);
        Self {
            company_name: b.name,
            website: b.website,
            phone: b.phone,
            address: b.address,
            industry: b.industry.or(b.category),
            description: b.description,
            location: b.location,
            city,
            state,
            company_size: b.company_size,
            total_funding: b.funding,
            rating: b.rating,
            source: b.source.to_string(),
            scraped_at: b.scraped_at,
            domain: None,
            email_patterns: Vec::new(),
            quality_score: 0.0,
        }
    }
}

/// Split `"Denver, CO 80202"` into city and state.
fn split_location(location: &str) -> (Option<String>, Option<String>) {
    let mut parts = location.split(',').map(str::trim);
    let city = parts
        .next()
        .filter(|c| !c.is_empty())
        .map(ToString::to_string);
    let state = parts
        .next()
        .and_then(|rest| rest.split_whitespace().next())
        .map(ToString::to_string);
    match state {
        Some(_) => (city, state),
        None => (None, None),
    }
}

/// Key two scraped leads are considered duplicates on.
#[must_use]
pub fn dedup_key(lead: &ScrapedLead) -> String {
    format!(
        "{}_{}",
        lead.company_name.to_lowercase(),
        lead.website.as_deref().unwrap_or_default().to_lowercase()
    )
}

/// Drop later leads that share a [`dedup_key`] with an earlier one.
#[must_use]
pub fn dedup_leads(leads: Vec<ScrapedLead>) -> Vec<ScrapedLead> {
    let mut seen = HashSet::new();
    leads
        .into_iter()
        .filter(|lead| seen.insert(dedup_key(lead)))
        .collect()
}

/// Host of a website, tolerating a missing scheme. Falls back to the raw value.
#[must_use]
pub fn website_domain(website: &str) -> String {
    let with_scheme = if website.starts_with("http") {
        website.to_string()
    } else {
        format!("https://{website}")
    };
    url::Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .map_or_else(
            || website.to_lowercase(),
            |host| host.strip_prefix("www.").map_or(host.clone(), ToString::to_string),
        )
}

/// Common corporate address layouts at `domain`.
#[must_use]
pub fn email_patterns(domain: &str) -> Vec<String> {
    ["first.last", "first", "first_last", "firstl", "f.last", "first.l"]
        .iter()
        .map(|p| format!("{p}@{domain}"))
        .collect()
}

/// Completeness score: company 20, website 20, phone 15, address 15,
/// industry 10, email patterns 20, out of 100.
#[must_use]
pub fn quality_score(lead: &ScrapedLead) -> f64 {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    let mut score = 0u32;
    if !lead.company_name.is_empty() {
        score += 20;
    }
    if present(&lead.website) {
        score += 20;
    }
    if present(&lead.phone) {
        score += 15;
    }
    if present(&lead.address) {
        score += 15;
    }
    if present(&lead.industry) {
        score += 10;
    }
    if !lead.email_patterns.is_empty() {
        score += 20;
    }
    f64::from(score) / 100.0
}

/// Fill in domain, email patterns and quality score.
#[must_use]
pub fn enrich_lead(mut lead: ScrapedLead) -> ScrapedLead {
    if let Some(website) = lead.website.as_deref().filter(|w| !w.is_empty()) {
        let domain = website_domain(website);
        lead.email_patterns = email_patterns(&domain);
        lead.domain = Some(domain);
    }
    lead.quality_score = quality_score(&lead);
    lead
}

/// Keep leads matching every given criterion.
///
/// Industry and state match exactly; city matches as a case-insensitive
/// substring. A lead missing a filtered field is dropped.
#[must_use]
pub fn filter_by_criteria(
    leads: Vec<ScrapedLead>,
    industry: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
) -> Vec<ScrapedLead> {
    let city = city.map(str::to_lowercase);
    leads
        .into_iter()
        .filter(|lead| industry.map_or(true, |i| lead.industry.as_deref() == Some(i)))
        .filter(|lead| {
            city.as_deref().map_or(true, |c| {
                lead.city
                    .as_deref()
                    .is_some_and(|lc| lc.to_lowercase().contains(c))
            })
        })
        .filter(|lead| state.map_or(true, |s| lead.state.as_deref() == Some(s)))
        .collect()
}

/// Scrapes lead sources through a [`PageFetcher`].
pub struct ScrapingEngine {
    fetcher: Arc<dyn PageFetcher>,
    sources: Vec<Source>,
    results_per_source: usize,
}

impl ScrapingEngine {
    /// Engine over the sources enabled in `config`.
    ///
    /// # Errors
    /// `UnknownSource` when `config.sources` names an unknown source.
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: &ScrapingConfig) -> Result<Self> {
        let mut sources = Source::parse_list(&config.sources)?;
        if sources.is_empty() {
            sources = Source::ALL.to_vec();
        }
        Ok(Self {
            fetcher,
            sources,
            results_per_source: config.results_per_source,
        })
    }

    /// Sources used by [`ScrapingEngine::scrape_leads`].
    #[must_use]
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Scrape one source, propagating failures.
    pub async fn try_scrape_source(
        &self,
        source: Source,
        query: &str,
        location: &str,
    ) -> Result<Vec<ScrapedBusiness>> {
        let definition = source.definition();
        let url = definition.search_url(query, location);
        tracing::debug!(target: "scraper", "Scraping {} at {}", source, url);

        let html = self.fetcher.fetch(&url, Some(definition.item)).await?;
        let limit = definition.result_limit(self.results_per_source);
        ResultParser::new(definition).parse(&html, limit)
    }

    /// Scrape one source. A failure is logged and yields no listings.
    pub async fn scrape_source(
        &self,
        source: Source,
        query: &str,
        location: &str,
    ) -> Vec<ScrapedBusiness> {
        match self.try_scrape_source(source, query, location).await {
            Ok(businesses) => {
                tracing::info!(target: "scraper", "Scraped {} listings from {}", businesses.len(), source);
                businesses
            }
            Err(e) => {
                tracing::error!(target: "scraper", "Error scraping {}: {}", source, e);
                Vec::new()
            }
        }
    }

    /// Scrape `sources` concurrently.
    pub async fn bulk_scrape(
        &self,
        query: &str,
        location: &str,
        sources: &[Source],
    ) -> BulkScrapeResult {
        let scrapes = sources
            .iter()
            .map(|&source| async move { (source, self.scrape_source(source, query, location).await) });
        let results: BTreeMap<_, _> = join_all(scrapes).await.into_iter().collect();
        let total_results = results.values().map(Vec::len).sum();

        tracing::info!(target: "scraper", "Bulk scraping completed. Total results: {}", total_results);
        BulkScrapeResult {
            results,
            total_results,
            scraped_at: Utc::now(),
        }
    }

    /// Scrape the configured sources into deduplicated, scored leads.
    pub async fn scrape_leads(
        &self,
        query: &str,
        location: &str,
        max_results: usize,
    ) -> Vec<ScrapedLead> {
        let bulk = self.bulk_scrape(query, location, &self.sources).await;
        let leads = bulk
            .results
            .into_values()
            .flatten()
            .map(ScrapedLead::from)
            .collect();

        dedup_leads(leads)
            .into_iter()
            .take(max_results)
            .map(enrich_lead)
            .collect()
    }
}
