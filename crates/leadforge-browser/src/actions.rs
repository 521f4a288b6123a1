//! The page-fetching seam scrapers depend on.

use crate::error::{BrowserError, Result};

/// Something that can load a page and hand back its rendered HTML.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    /// Load `url`, optionally wait for `wait_selector`, and return the HTML.
    async fn fetch(&self, url: &str, wait_selector: Option<&str>) -> Result<String>;
}

/// Host of `url` with any leading `www.` removed.
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url).map_err(|e| BrowserError::InvalidUrl(e.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| BrowserError::InvalidUrl("URL has no host".to_string()))?
        .to_lowercase();

    Ok(host.strip_prefix("www.").map_or(host.clone(), ToString::to_string))
}
