//! Email format checks and domain verification.

use crate::error::{EnrichmentError, Result};
use chrono::{DateTime, Utc};
use leadforge_core::{email_regex, EnrichmentConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Whether `email` looks like `local@domain.tld`.
#[must_use]
pub fn validate_email_format(email: &str) -> bool {
    email_regex().is_match(email)
}

/// What was learned about a mail domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainVerification {
    /// Domain checked
    pub domain: String,
    /// At least one MX record exists
    pub has_mx_records: bool,
    /// Port 80 accepted a connection
    pub is_reachable: bool,
    /// MX exchanges, lowest preference first
    pub mx_records: Vec<String>,
    /// Check time
    pub verified_at: DateTime<Utc>,
    /// Lookup failure, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainVerification {
    /// A result for a domain that could not be checked.
    #[must_use]
    pub fn failed(domain: &str, error: impl Into<String>) -> Self {
        Self {
            domain: domain.to_string(),
            has_mx_records: false,
            is_reachable: false,
            mx_records: Vec::new(),
            verified_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Score an address: 30 for a valid format, 40 for MX records and 30 for a
/// reachable domain, capped at 100.
#[must_use]
pub fn score_email(format_valid: bool, verification: &DomainVerification) -> u32 {
    let mut score = 0;
    if format_valid {
        score += 30;
    }
    if verification.has_mx_records {
        score += 40;
    }
    if verification.is_reachable {
        score += 30;
    }
    score.min(100)
}

/// Checks whether a domain can receive mail.
#[async_trait::async_trait]
pub trait DomainVerifier: Send + Sync {
    /// Verify `domain`. Failures are reported in the result, not raised.
    async fn verify_domain(&self, domain: &str) -> DomainVerification;
}

/// Verifies domains with MX lookups and a TCP probe on port 80.
pub struct DnsDomainVerifier {
    resolver: TokioAsyncResolver,
    dns_timeout: Duration,
    tcp_timeout: Duration,
}

impl DnsDomainVerifier {
    /// Use the system resolver, or public defaults when it is unavailable.
    #[must_use]
    pub fn new(config: &EnrichmentConfig) -> Self {
        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::warn!("System DNS config unavailable ({}), using defaults", e);
                TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self::with_resolver(resolver, config)
    }

    /// Use an explicit resolver.
    #[must_use]
    pub fn with_resolver(resolver: TokioAsyncResolver, config: &EnrichmentConfig) -> Self {
        Self {
            resolver,
            dns_timeout: Duration::from_secs(config.dns_timeout_secs),
            tcp_timeout: Duration::from_secs(config.tcp_timeout_secs),
        }
    }

    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>> {
        let lookup = tokio::time::timeout(self.dns_timeout, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| EnrichmentError::Resolver(format!("MX lookup for {domain} timed out")))?
            .map_err(|e| EnrichmentError::Resolver(e.to_string()))?;

        let mut records: Vec<_> = lookup
            .iter()
            .map(|mx| (mx.preference(), mx.exchange().to_utf8()))
            .collect();
        records.sort();
        Ok(records
            .into_iter()
            .map(|(_, host)| host.trim_end_matches('.').to_string())
            .collect())
    }

    async fn is_reachable(&self, domain: &str) -> bool {
        matches!(
            tokio::time::timeout(self.tcp_timeout, TcpStream::connect((domain, 80))).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait::async_trait]
impl DomainVerifier for DnsDomainVerifier {
    async fn verify_domain(&self, domain: &str) -> DomainVerification {
        let mx_records = match self.lookup_mx(domain).await {
            Ok(records) => records,
            Err(e) => {
                tracing::debug!("Domain verification failed for {}: {}", domain, e);
                return DomainVerification::failed(domain, e.to_string());
            }
        };
        let is_reachable = self.is_reachable(domain).await;

        DomainVerification {
            domain: domain.to_string(),
            has_mx_records: !mx_records.is_empty(),
            is_reachable,
            mx_records,
            verified_at: Utc::now(),
            error: None,
        }
    }
}
