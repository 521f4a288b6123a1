//! Lead-level email enrichment.

use crate::domain::{email_domain, extract_domain, website_host};
use crate::generator::{generate_emails, generate_person_patterns, GeneratedEmail};
use crate::verifier::{score_email, validate_email_format, DomainVerification, DomainVerifier};
use chrono::{DateTime, Utc};
use leadforge_core::EnrichmentConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A candidate address with its verification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailVerification {
    /// Candidate that was checked
    #[serde(flatten)]
    pub candidate: GeneratedEmail,
    /// Format check result
    pub is_valid_format: bool,
    /// Domain check, absent when the address has no domain
    pub domain_info: Option<DomainVerification>,
    /// `0..=100`, see [`score_email`]
    pub overall_score: u32,
    /// Verification time
    pub verified_at: DateTime<Utc>,
}

/// What enrichment needs to know about a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadProfile {
    /// Company name
    pub company_name: String,
    /// Known mail domain
    pub domain: Option<String>,
    /// Company website
    pub website: Option<String>,
    /// Contact first name
    pub first_name: Option<String>,
    /// Contact last name
    pub last_name: Option<String>,
}

impl LeadProfile {
    /// Mail domain from, in order, the known domain, the website host or the
    /// company name.
    #[must_use]
    pub fn resolve_domain(&self) -> Option<String> {
        self.domain
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.website.as_deref().and_then(website_host))
            .or_else(|| extract_domain(&self.company_name).ok())
    }
}

/// Enrichment result for one lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadEmails {
    /// Scored candidates
    pub emails: Vec<EmailVerification>,
    /// Best candidate address, or a `contact@` guess when none could be built
    pub best_email: Option<String>,
    /// Number of candidates
    pub email_count: usize,
}

/// A company submitted for bulk email generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyRef {
    /// Caller's identifier
    pub id: Option<String>,
    /// Company name
    pub company_name: String,
    /// Known domain
    pub domain: Option<String>,
}

/// Generated and verified emails for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyEmails {
    /// `id`, or the company name when none was given
    pub company_id: String,
    /// Company name
    pub company_name: String,
    /// Scored candidates
    pub emails: Vec<EmailVerification>,
    /// Number of candidates
    pub total_emails: usize,
    /// Highest-scoring candidate
    pub best_email: Option<EmailVerification>,
    /// Why nothing was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Completion time
    pub generated_at: DateTime<Utc>,
}

/// Highest score wins, then highest confidence, then earliest.
#[must_use]
pub fn best_email(emails: &[EmailVerification]) -> Option<&EmailVerification> {
    emails.iter().reduce(|best, e| {
        let better = e.overall_score > best.overall_score
            || (e.overall_score == best.overall_score
                && e.candidate.confidence > best.candidate.confidence);
        if better {
            e
        } else {
            best
        }
    })
}

/// `contact@<company without spaces>.com`, used when no candidate exists.
#[must_use]
pub fn fallback_email(company_name: &str) -> String {
    let local: String = company_name
        .to_lowercase()
        .split_whitespace()
        .collect();
    format!("contact@{local}.com")
}

type DomainCache = HashMap<String, DomainVerification>;

/// Generates, verifies and ranks email addresses for leads.
pub struct EmailEnricher {
    verifier: Arc<dyn DomainVerifier>,
    config: EnrichmentConfig,
}

impl EmailEnricher {
    /// Enricher checking domains with `verifier`.
    pub fn new(verifier: Arc<dyn DomainVerifier>, config: EnrichmentConfig) -> Self {
        Self { verifier, config }
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    async fn verify_cached(
        &self,
        candidate: GeneratedEmail,
        cache: &mut DomainCache,
    ) -> EmailVerification {
        let is_valid_format = validate_email_format(&candidate.email);
        let domain_info = match email_domain(&candidate.email) {
            Some(domain) => {
                let domain = domain.to_lowercase();
                if let Some(hit) = cache.get(&domain) {
                    Some(hit.clone())
                } else {
                    let verification = self.verifier.verify_domain(&domain).await;
                    cache.insert(domain, verification.clone());
                    Some(verification)
                }
            }
            None => None,
        };
        let overall_score = domain_info
            .as_ref()
            .map_or(if is_valid_format { 30 } else { 0 }, |d| {
                score_email(is_valid_format, d)
            });

        EmailVerification {
            candidate,
            is_valid_format,
            domain_info,
            overall_score,
            verified_at: Utc::now(),
        }
    }

    async fn verify_all(
        &self,
        candidates: Vec<GeneratedEmail>,
        cache: &mut DomainCache,
    ) -> Vec<EmailVerification> {
        let mut verified = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            verified.push(self.verify_cached(candidate, cache).await);
        }
        verified
    }

    /// Verify a single address supplied by the caller.
    pub async fn verify_email(&self, email: &str) -> EmailVerification {
        let candidate = GeneratedEmail {
            email: email.trim().to_string(),
            pattern: "provided".to_string(),
            confidence: 1.0,
            generated_at: Utc::now(),
        };
        self.verify_cached(candidate, &mut DomainCache::new()).await
    }

    /// Verify candidates, looking each domain up once.
    pub async fn verify_emails(&self, candidates: Vec<GeneratedEmail>) -> Vec<EmailVerification> {
        self.verify_all(candidates, &mut DomainCache::new()).await
    }

    fn candidates_for(&self, lead: &LeadProfile, domain: &str) -> Vec<GeneratedEmail> {
        let max = self.config.emails_per_lead.min(self.config.max_generated_emails);
        let mut candidates = match (lead.first_name.as_deref(), lead.last_name.as_deref()) {
            (Some(first), Some(last)) => generate_person_patterns(first, last, domain),
            _ => Vec::new(),
        };
        for generated in generate_emails(&lead.company_name, domain, max) {
            if !candidates.iter().any(|c| c.email == generated.email) {
                candidates.push(generated);
            }
        }
        candidates.truncate(max);
        candidates
    }

    async fn enrich_cached(&self, lead: &LeadProfile, cache: &mut DomainCache) -> LeadEmails {
        let candidates = lead
            .resolve_domain()
            .map(|domain| self.candidates_for(lead, &domain))
            .unwrap_or_default();

        if candidates.is_empty() {
            tracing::debug!("No email candidates for {}, using fallback", lead.company_name);
            return LeadEmails {
                emails: Vec::new(),
                best_email: Some(fallback_email(&lead.company_name)),
                email_count: 0,
            };
        }

        let emails = self.verify_all(candidates, cache).await;
        LeadEmails {
            best_email: best_email(&emails).map(|e| e.candidate.email.clone()),
            email_count: emails.len(),
            emails,
        }
    }

    /// Candidates for one lead, verified and ranked.
    pub async fn enrich_lead(&self, lead: &LeadProfile) -> LeadEmails {
        self.enrich_cached(lead, &mut DomainCache::new()).await
    }

    /// Enrich several leads, sharing domain lookups across them.
    pub async fn enrich_leads(&self, leads: &[LeadProfile]) -> Vec<LeadEmails> {
        let mut cache = DomainCache::new();
        let mut results = Vec::with_capacity(leads.len());
        for lead in leads {
            results.push(self.enrich_cached(lead, &mut cache).await);
        }
        tracing::info!("Enriched {} leads ({} domains checked)", leads.len(), cache.len());
        results
    }

    /// Generate and verify emails for each company.
    pub async fn bulk_generate(&self, companies: &[CompanyRef]) -> Vec<CompanyEmails> {
        let mut cache = DomainCache::new();
        let mut results = Vec::with_capacity(companies.len());

        for company in companies {
            let company_id = company
                .id
                .clone()
                .unwrap_or_else(|| company.company_name.clone());
            let domain = company
                .domain
                .clone()
                .filter(|d| !d.is_empty())
                .map_or_else(|| extract_domain(&company.company_name), Ok);

            let result = match domain {
                Ok(domain) => {
                    let candidates =
                        generate_emails(&company.company_name, &domain, self.config.emails_per_lead);
                    let emails = self.verify_all(candidates, &mut cache).await;
                    CompanyEmails {
                        company_id,
                        company_name: company.company_name.clone(),
                        total_emails: emails.len(),
                        best_email: best_email(&emails).cloned(),
                        emails,
                        error: None,
                        generated_at: Utc::now(),
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to generate emails for {}: {}", company.company_name, e);
                    CompanyEmails {
                        company_id,
                        company_name: company.company_name.clone(),
                        emails: Vec::new(),
                        total_emails: 0,
                        best_email: None,
                        error: Some(e.to_string()),
                        generated_at: Utc::now(),
                    }
                }
            };
            results.push(result);
        }
        results
    }
}
