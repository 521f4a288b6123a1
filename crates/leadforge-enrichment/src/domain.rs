//! Turning company names and websites into email domains.

use crate::error::{EnrichmentError, Result};

const MAX_GENERATED_LABEL: usize = 20;

/// Domain for a company name or website.
///
/// Inputs that look like a `.com`, `.org` or `.net` address are parsed as a
/// URL and reduced to their host without `www.`. Anything else becomes the
/// lowercased alphanumerics of the name, cut to 20 characters, plus `.com`.
///
/// # Errors
/// `NoDomain` when nothing usable remains.
pub fn extract_domain(company_or_url: &str) -> Result<String> {
    let input = company_or_url.trim();

    if [".com", ".org", ".net"].iter().any(|tld| input.contains(tld)) {
        return website_host(input).ok_or_else(|| EnrichmentError::NoDomain(input.to_string()));
    }

    let label: String = input
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_GENERATED_LABEL)
        .collect();
    if label.is_empty() {
        return Err(EnrichmentError::NoDomain(input.to_string()));
    }
    Ok(format!("{label}.com"))
}

/// Host of a website URL without `www.`, for any TLD. A missing scheme is
/// assumed to be `https`. `None` unless the host has at least one dot.
#[must_use]
pub fn website_host(website: &str) -> Option<String> {
    let website = website.trim();
    let with_scheme = if website.starts_with("http://") || website.starts_with("https://") {
        website.to_string()
    } else {
        format!("https://{website}")
    };
    let host = url::Url::parse(&with_scheme)
        .ok()?
        .host_str()?
        .to_lowercase();
    let host = host.strip_prefix("www.").map_or(host.clone(), ToString::to_string);
    host.contains('.').then_some(host)
}

/// Domain part of an email address.
#[must_use]
pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, d)| d).filter(|d| !d.is_empty())
}
