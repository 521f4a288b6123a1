//! Contact details scraped from company websites over plain HTTP.

use crate::error::{Result, ScrapeError};
use chrono::{DateTime, Utc};
use leadforge_browser::random_user_agent;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("Email regex is hardcoded and valid")
});

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?(?:\([0-9]{3}\)|[0-9]{3})[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}")
        .expect("Phone regex is hardcoded and valid")
});

static ADDRESS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("address, .address, .contact-info, .location")
        .expect("Address selector is hardcoded and valid")
});

static SOCIAL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "a[href*=\"facebook.com\"], a[href*=\"twitter.com\"], a[href*=\"linkedin.com\"], a[href*=\"instagram.com\"]",
    )
    .expect("Social selector is hardcoded and valid")
});

/// Paths tried, in order, when looking for a contact page.
pub const CONTACT_PATHS: [&str; 5] = [
    "/contact",
    "/contact-us",
    "/about/contact",
    "/get-in-touch",
    "/reach-us",
];

/// Contact details found on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Email addresses, deduplicated
    pub emails: Vec<String>,
    /// Phone numbers, deduplicated
    pub phones: Vec<String>,
    /// Address blocks
    pub addresses: Vec<String>,
    /// Social profile links
    pub social_links: Vec<String>,
    /// Page the details came from
    pub source: String,
    /// Fetch time
    pub scraped_at: DateTime<Utc>,
}

impl ContactInfo {
    /// Whether the page yielded an email or phone number.
    #[must_use]
    pub fn has_contact(&self) -> bool {
        !self.emails.is_empty() || !self.phones.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

/// Extract contact details from a page's HTML.
#[must_use]
pub fn extract_contact_info(html: &str, source: &str) -> ContactInfo {
    let document = Html::parse_document(html);
    let page_text = document.root_element().text().collect::<Vec<_>>().join(" ");

    let mut emails = Vec::new();
    for m in EMAIL_PATTERN.find_iter(&page_text) {
        push_unique(&mut emails, m.as_str());
    }

    let mut phones = Vec::new();
    for m in PHONE_PATTERN.find_iter(&page_text) {
        push_unique(&mut phones, m.as_str());
    }

    let addresses = document
        .select(&ADDRESS_SELECTOR)
        .map(|el| {
            el.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|a| a.len() > 10)
        .collect();

    let mut social_links = Vec::new();
    for el in document.select(&SOCIAL_SELECTOR) {
        if let Some(href) = el.value().attr("href") {
            push_unique(&mut social_links, href);
        }
    }

    ContactInfo {
        emails,
        phones,
        addresses,
        social_links,
        source: source.to_string(),
        scraped_at: Utc::now(),
    }
}

/// Candidate contact page URLs for a site, in the order they are tried.
#[must_use]
pub fn contact_page_urls(website: &str) -> Vec<String> {
    let base = website.trim_end_matches('/');
    CONTACT_PATHS
        .iter()
        .map(|path| format!("{base}{path}"))
        .collect()
}

/// Fetches company websites with a plain HTTP client.
#[derive(Debug, Clone)]
pub struct WebsiteScraper {
    client: reqwest::Client,
}

impl WebsiteScraper {
    /// Client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and extract its contact details.
    pub async fn scrape_company_website(&self, url: &str) -> Result<ContactInfo> {
        url::Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;

        let html = self
            .client
            .get(url)
            .header(USER_AGENT, random_user_agent())
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let info = extract_contact_info(&html, url);
        tracing::info!(
            "Scraped contact info from {} ({} emails, {} phones)",
            url,
            info.emails.len(),
            info.phones.len()
        );
        Ok(info)
    }

    /// Try the usual contact pages, falling back to the site itself.
    pub async fn scrape_contact_page(&self, website: &str) -> Result<ContactInfo> {
        for url in contact_page_urls(website) {
            match self.scrape_company_website(&url).await {
                Ok(info) if info.has_contact() => {
                    tracing::info!("Found contact info at {}", url);
                    return Ok(info);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("No contact page at {}: {}", url, e),
            }
        }
        self.scrape_company_website(website).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CONTACT_HTML: &str = r#"
        <html><body>
            <h1>Contact Acme</h1>
            <p>Email sales@acme.com or support@acme.com, or sales@acme.com again.</p>
            <p>Call (303) 555-0100 or 303.555.0100</p>
            <address>500 Market Street, Suite 200, Denver CO</address>
            <div class="location">Denver</div>
            <a href="https://www.linkedin.com/company/acme">LinkedIn</a>
            <a href="https://twitter.com/acme">Twitter</a>
            <a href="https://twitter.com/acme">Twitter again</a>
            <a href="/about">About</a>
        </body></html>
    "#;

    #[test]
    fn test_extract_contact_info() {
        let info = extract_contact_info(CONTACT_HTML, "https://acme.com/contact");
        assert_eq!(info.emails, vec!["sales@acme.com", "support@acme.com"]);
        assert_eq!(info.phones, vec!["(303) 555-0100", "303.555.0100"]);
        assert_eq!(info.addresses, vec!["500 Market Street, Suite 200, Denver CO"]);
        assert_eq!(
            info.social_links,
            vec!["https://www.linkedin.com/company/acme", "https://twitter.com/acme"]
        );
        assert!(info.has_contact());
        assert_eq!(info.source, "https://acme.com/contact");
    }

    #[test]
    fn test_page_without_contact() {
        let info = extract_contact_info("<p>Nothing here</p>", "https://acme.com");
        assert!(!info.has_contact());
        assert!(info.addresses.is_empty());
    }

    #[test]
    fn test_contact_page_urls() {
        let urls = contact_page_urls("https://acme.com/");
        assert_eq!(urls[0], "https://acme.com/contact");
        assert_eq!(urls[4], "https://acme.com/reach-us");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let scraper = WebsiteScraper::new(Duration::from_secs(1)).unwrap();
        let err = scraper.scrape_company_website("acme dot com").await.unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidUrl(_)));
    }
}
