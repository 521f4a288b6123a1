//! Per-domain rate limiting for scraped sites.
//!
//! Each registered domain gets a fixed window of `points` requests. Once the
//! points are spent the domain is blocked for `block` before a fresh window
//! opens. Domains that were never registered are not limited.

use crate::error::{BrowserError, Result};
use leadforge_core::ScrapingConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Domains limited out of the box.
pub const DEFAULT_LIMITED_DOMAINS: [&str; 5] = [
    "google.com",
    "linkedin.com",
    "yelp.com",
    "yellowpages.com",
    "crunchbase.com",
];

/// Budget for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainLimit {
    /// Requests allowed per window
    pub points: u32,
    /// Window length
    pub window: Duration,
    /// Block applied once the points run out
    pub block: Duration,
}

impl Default for DomainLimit {
    fn default() -> Self {
        Self {
            points: 10,
            window: Duration::from_secs(60),
            block: Duration::from_secs(300),
        }
    }
}

impl From<&ScrapingConfig> for DomainLimit {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            points: config.domain_points.max(1),
            window: Duration::from_secs(config.domain_window_secs),
            block: Duration::from_secs(config.domain_block_secs),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    consumed: u32,
    blocked_until: Option<Instant>,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            consumed: 0,
            blocked_until: None,
        }
    }

    /// Spend one point, or return how long until one is available.
    fn consume(&mut self, limit: DomainLimit, now: Instant) -> std::result::Result<(), Duration> {
        if let Some(until) = self.blocked_until {
            if now < until {
                return Err(until - now);
            }
            *self = Self::new(now);
        }
        if now.duration_since(self.window_start) >= limit.window {
            *self = Self::new(now);
        }

        if self.consumed < limit.points {
            self.consumed += 1;
            return Ok(());
        }

        let until = now + limit.block;
        self.blocked_until = Some(until);
        Err(limit.block)
    }
}

/// Token buckets keyed by registered domain.
#[derive(Debug, Default)]
pub struct DomainRateLimiter {
    limits: HashMap<String, DomainLimit>,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl DomainRateLimiter {
    /// A limiter with no registered domains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A limiter covering [`DEFAULT_LIMITED_DOMAINS`] with `limit`.
    #[must_use]
    pub fn with_defaults(limit: DomainLimit) -> Self {
        let mut limiter = Self::new();
        for domain in DEFAULT_LIMITED_DOMAINS {
            limiter.register(domain, limit);
        }
        limiter
    }

    /// Register (or replace) a domain's budget.
    pub fn register(&mut self, domain: &str, limit: DomainLimit) {
        self.limits.insert(domain.to_lowercase(), limit);
    }

    /// The registered domain covering `domain`, if any.
    ///
    /// `maps.google.com` is covered by `google.com`.
    #[must_use]
    pub fn limit_key(&self, domain: &str) -> Option<(&str, DomainLimit)> {
        let domain = domain.to_lowercase();
        self.limits
            .iter()
            .find(|(key, _)| domain == **key || domain.ends_with(&format!(".{key}")))
            .map(|(key, limit)| (key.as_str(), *limit))
    }

    /// Take a point for `domain` without waiting.
    ///
    /// # Errors
    /// `RateLimitExceeded` with the time until the next point.
    pub async fn try_acquire(&self, domain: &str) -> Result<()> {
        let Some((key, limit)) = self.limit_key(domain) else {
            return Ok(());
        };

        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(now));

        bucket
            .consume(limit, now)
            .map_err(|retry_after| BrowserError::RateLimitExceeded {
                domain: key.to_string(),
                retry_after,
            })
    }

    /// Take a point for `domain`, sleeping until one is available.
    pub async fn acquire(&self, domain: &str) {
        loop {
            match self.try_acquire(domain).await {
                Ok(()) => return,
                Err(BrowserError::RateLimitExceeded {
                    domain,
                    retry_after,
                }) => {
                    tracing::warn!(
                        "Rate limit hit for {}, waiting {}ms",
                        domain,
                        retry_after.as_millis()
                    );
                    tokio::time::sleep(retry_after).await;
                }
                Err(_) => return,
            }
        }
    }
}
