//! Browser fingerprint randomization and proxy rotation.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// User agents rotated across scraping requests.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

const VIEWPORTS: [(u32, u32); 4] = [(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

/// Pick a user agent at random.
#[must_use]
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
}

/// Per-page fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// User agent string
    pub user_agent: String,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl FingerprintConfig {
    /// Random user agent and viewport.
    #[must_use]
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();
        let (viewport_width, viewport_height) = VIEWPORTS[rng.gen_range(0..VIEWPORTS.len())];

        Self {
            user_agent: random_user_agent().to_string(),
            viewport_width,
            viewport_height,
        }
    }
}

/// Round-robin over a proxy list.
#[derive(Debug, Default)]
pub struct ProxyRotator {
    proxies: Vec<String>,
    next: AtomicUsize,
}

impl ProxyRotator {
    /// Rotate over `proxies`.
    #[must_use]
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            next: AtomicUsize::new(0),
        }
    }

    /// Next proxy in turn, `None` when the list is empty.
    pub fn next_proxy(&self) -> Option<&str> {
        if self.proxies.is_empty() {
            return None;
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        Some(self.proxies[i].as_str())
    }

    /// Number of proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Whether no proxies are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_randomized_fingerprint_valid() {
        let fp = FingerprintConfig::randomized();
        assert!(USER_AGENTS.contains(&fp.user_agent.as_str()));
        assert!(VIEWPORTS.contains(&(fp.viewport_width, fp.viewport_height)));
    }

    #[test]
    fn test_fingerprints_vary() {
        let fps: Vec<_> = (0..20).map(|_| FingerprintConfig::randomized()).collect();
        let unique_agents: std::collections::HashSet<_> =
            fps.iter().map(|f| f.user_agent.clone()).collect();
        assert!(unique_agents.len() > 1);
    }

    #[test]
    fn test_proxy_rotation() {
        let rotator = ProxyRotator::new(vec!["http://a:1".to_string(), "http://b:2".to_string()]);
        assert_eq!(rotator.next_proxy(), Some("http://a:1"));
        assert_eq!(rotator.next_proxy(), Some("http://b:2"));
        assert_eq!(rotator.next_proxy(), Some("http://a:1"));
        assert_eq!(rotator.len(), 2);
    }

    #[test]
    fn test_empty_proxy_list() {
        let rotator = ProxyRotator::default();
        assert!(rotator.is_empty());
        assert_eq!(rotator.next_proxy(), None);
    }
}
