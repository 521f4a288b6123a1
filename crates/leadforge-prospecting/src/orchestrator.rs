//! Prospecting orchestrator.
//!
//! A job runs `scraping -> email_enrichment -> storing -> finalizing` in a
//! background task. Each job owns a [`CancellationToken`]; cancelling the job
//! trips the token, which drops the running pipeline at its next await point.
//! Job rows are never moved out of a terminal state, so a late step of a
//! cancelled job cannot overwrite `cancelled`.

use crate::criteria::SearchCriteria;
use crate::error::{ProspectingError, Result};
use crate::events::ProgressEvent;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use leadforge_core::{JobStatus, ProspectingConfig, ProspectingStep, TimeRange};
use leadforge_db::lead_emails::{self, NewLeadEmail};
use leadforge_db::leads::{self, Lead, LeadInput};
use leadforge_db::prospecting_jobs::{self, JobStats, ProspectingJob};
use leadforge_db::{Database, DatabaseError};
use leadforge_enrichment::{EmailEnricher, EmailVerification, LeadProfile};
use leadforge_scraper::{filter_by_criteria, ScrapedLead, ScrapingEngine};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Source recorded for prospected leads that do not name one.
pub const DEFAULT_SOURCE: &str = "prospecting_search";

/// Lead fields for a scraped listing. `company_size` lands in `team_size`.
#[must_use]
pub fn scraped_lead_input(s: ScrapedLead) -> LeadInput {
    LeadInput {
        company_name: Some(s.company_name),
        website: s.website,
        phone: s.phone,
        address: s.address,
        industry: s.industry,
        description: s.description,
        city: s.city,
        state: s.state,
        team_size: s.company_size,
        total_funding: s.total_funding,
        source: Some(s.source),
        quality_score: Some(s.quality_score),
        email_patterns: Some(s.email_patterns),
        domain: s.domain,
        scraped_at: Some(s.scraped_at),
        ..LeadInput::default()
    }
}

/// A lead on its way through the pipeline.
#[derive(Debug, Clone)]
struct Candidate {
    /// Row id when the lead came from the database
    existing_id: Option<i64>,
    lead: LeadInput,
    emails: Vec<NewLeadEmail>,
}

impl Candidate {
    fn scraped(s: ScrapedLead) -> Self {
        Self {
            existing_id: None,
            lead: scraped_lead_input(s),
            emails: Vec::new(),
        }
    }

    fn stored(lead: &Lead) -> Self {
        Self {
            existing_id: Some(lead.id),
            lead: LeadInput::from(lead),
            emails: Vec::new(),
        }
    }

    fn company_name(&self) -> &str {
        self.lead.company_name.as_deref().unwrap_or_default()
    }

    fn merge_key(&self) -> String {
        format!(
            "{}-{}",
            self.company_name().trim().to_lowercase(),
            self.lead.email.as_deref().unwrap_or_default().trim().to_lowercase()
        )
    }

    fn needs_email(&self) -> bool {
        self.lead.email.as_deref().map_or(true, |e| e.trim().is_empty())
    }

    fn profile(&self) -> LeadProfile {
        LeadProfile {
            company_name: self.company_name().to_string(),
            domain: self.lead.domain.clone(),
            website: self.lead.website.clone(),
            first_name: self.lead.first_name.clone(),
            last_name: self.lead.last_name.clone(),
        }
    }
}

/// Stored leads first, then scraped ones, without duplicates and capped at `limit`.
fn merge_candidates(stored: &[Lead], scraped: Vec<ScrapedLead>, limit: usize) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    stored
        .iter()
        .map(Candidate::stored)
        .chain(scraped.into_iter().map(Candidate::scraped))
        .filter(|c| seen.insert(c.merge_key()))
        .take(limit)
        .collect()
}

fn stored_email(v: &EmailVerification) -> NewLeadEmail {
    NewLeadEmail {
        email: v.candidate.email.clone(),
        pattern: v.candidate.pattern.clone(),
        confidence: v.candidate.confidence,
        is_valid_format: v.is_valid_format,
        overall_score: i64::from(v.overall_score),
        domain_info: v
            .domain_info
            .as_ref()
            .and_then(|d| serde_json::to_value(d).ok()),
        verified_at: Some(v.verified_at),
    }
}

/// Lead counts per quality band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualityDistribution {
    /// `quality_score >= 0.8`
    pub high: usize,
    /// `0.5 <= quality_score < 0.8`
    pub medium: usize,
    /// Everything else, including unscored leads
    pub low: usize,
}

/// Summary stored on a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatistics {
    /// Leads stored
    pub total_leads: usize,
    /// Email candidates stored
    pub total_emails: usize,
    /// Candidates with valid syntax
    pub valid_emails: usize,
    /// Candidates at or above the high-confidence score
    pub high_confidence_emails: usize,
    /// Mean candidate score, rounded
    pub average_email_score: i64,
    /// Lead quality bands
    pub quality_distribution: QualityDistribution,
    /// When the summary was computed
    pub generated_at: DateTime<Utc>,
}

impl JobStatistics {
    /// Summarize stored leads and their email candidates.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn compute(leads: &[Lead], emails: &[NewLeadEmail], high_confidence_score: i64) -> Self {
        let mut quality_distribution = QualityDistribution::default();
        for lead in leads {
            match lead.quality_score.unwrap_or(0.0) {
                q if q >= 0.8 => quality_distribution.high += 1,
                q if q >= 0.5 => quality_distribution.medium += 1,
                _ => quality_distribution.low += 1,
            }
        }

        let average_email_score = if emails.is_empty() {
            0
        } else {
            let sum: i64 = emails.iter().map(|e| e.overall_score).sum();
            (sum as f64 / emails.len() as f64).round() as i64
        };

        Self {
            total_leads: leads.len(),
            total_emails: emails.len(),
            valid_emails: emails.iter().filter(|e| e.is_valid_format).count(),
            high_confidence_emails: emails
                .iter()
                .filter(|e| e.overall_score >= high_confidence_score)
                .count(),
            average_email_score,
            quality_distribution,
            generated_at: Utc::now(),
        }
    }
}

/// A job with diagnostics for troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDebugInfo {
    /// The job row
    pub job: ProspectingJob,
    /// Leads linked to the job
    pub stored_leads: i64,
    /// Minutes since the job was created
    pub job_age_minutes: i64,
    /// Whether this process is still running the pipeline
    pub is_running: bool,
}

enum Outcome {
    Completed { total_leads: usize },
    Cancelled,
}

enum PollState {
    Connect,
    Poll { first: bool },
}

/// Starts, tracks and cancels prospecting jobs.
#[derive(Clone)]
pub struct ProspectingOrchestrator {
    db: Arc<Database>,
    scraper: Arc<ScrapingEngine>,
    enricher: Arc<EmailEnricher>,
    config: ProspectingConfig,
    running: Arc<Mutex<HashMap<i64, CancellationToken>>>,
}

impl ProspectingOrchestrator {
    /// Create an orchestrator over shared services.
    #[must_use]
    pub fn new(
        db: Arc<Database>,
        scraper: Arc<ScrapingEngine>,
        enricher: Arc<EmailEnricher>,
        config: ProspectingConfig,
    ) -> Self {
        Self {
            db,
            scraper,
            enricher,
            config,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Prospecting settings.
    #[must_use]
    pub fn config(&self) -> &ProspectingConfig {
        &self.config
    }

    /// Default interval between progress polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.progress_poll_ms)
    }

    /// Validate `criteria`, record a `pending` job and run it in the background.
    ///
    /// Returns the job id as soon as the job row exists.
    pub async fn start_job(&self, criteria: SearchCriteria) -> Result<i64> {
        let criteria = criteria.prepare(&self.config)?;
        let job = prospecting_jobs::create(self.db.pool(), &serde_json::to_value(&criteria)?).await?;
        let job_id = job.id;

        tracing::info!(
            target: "prospecting",
            job_id,
            query = %criteria.build_search_query(),
            "Prospecting job created"
        );

        let token = CancellationToken::new();
        self.running.lock().await.insert(job_id, token.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.run_job(job_id, criteria, token).await;
        });

        Ok(job_id)
    }

    /// Cancel a job and stop its pipeline if it is running here.
    ///
    /// # Errors
    /// `JobNotFound` for an unknown job, `JobConflict` when it already finished.
    pub async fn cancel_job(&self, job_id: i64) -> Result<ProspectingJob> {
        let job = prospecting_jobs::cancel(self.db.pool(), job_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFoundWithMessage(_) => ProspectingError::JobNotFound(job_id),
                other => other.into(),
            })?;

        if let Some(token) = self.running.lock().await.remove(&job_id) {
            token.cancel();
        }
        tracing::info!(target: "prospecting", job_id, "Prospecting job cancelled");
        Ok(job)
    }

    /// Whether the pipeline for `job_id` is running in this process.
    pub async fn is_running(&self, job_id: i64) -> bool {
        self.running.lock().await.contains_key(&job_id)
    }

    async fn run_job(&self, job_id: i64, criteria: SearchCriteria, token: CancellationToken) {
        tracing::info!(target: "prospecting", job_id, "Processing prospecting job");

        let result = tokio::select! {
            () = token.cancelled() => Ok(Outcome::Cancelled),
            result = self.run_pipeline(job_id, &criteria) => result,
        };
        self.running.lock().await.remove(&job_id);

        match result {
            Ok(Outcome::Completed { total_leads }) => {
                tracing::info!(
                    target: "prospecting",
                    job_id,
                    total_leads,
                    "Prospecting job completed"
                );
            }
            Ok(Outcome::Cancelled) => {
                tracing::info!(target: "prospecting", job_id, "Prospecting job stopped after cancellation");
            }
            Err(e) => {
                tracing::error!(target: "prospecting", job_id, "Prospecting job failed: {}", e);
                if let Err(e) = prospecting_jobs::fail(self.db.pool(), job_id, &e.to_string()).await {
                    tracing::error!(target: "prospecting", job_id, "Failed to record job failure: {}", e);
                }
            }
        }
    }

    /// Move the job to `step`. `false` means the job was finished elsewhere.
    async fn advance(&self, job_id: i64, step: ProspectingStep) -> Result<bool> {
        tracing::debug!(target: "prospecting", job_id, %step, "Advancing job");
        Ok(prospecting_jobs::set_progress(self.db.pool(), job_id, step).await?)
    }

    async fn run_pipeline(&self, job_id: i64, criteria: &SearchCriteria) -> Result<Outcome> {
        let pool = self.db.pool();
        if !prospecting_jobs::set_status(pool, job_id, JobStatus::Processing).await? {
            return Ok(Outcome::Cancelled);
        }
        let limit = usize::try_from(
            criteria
                .max_results
                .unwrap_or(self.config.default_max_results),
        )
        .unwrap_or(usize::MAX);

        if !self.advance(job_id, ProspectingStep::Scraping).await? {
            return Ok(Outcome::Cancelled);
        }
        let scraped = self.scrape(criteria, limit).await;
        let stored = leads::search_by_criteria(pool, &criteria.lead_search()).await?;
        tracing::info!(
            target: "prospecting",
            job_id,
            scraped = scraped.len(),
            stored = stored.len(),
            "Collected lead candidates"
        );
        let mut candidates = merge_candidates(&stored, scraped, limit);

        if !self.advance(job_id, ProspectingStep::EmailEnrichment).await? {
            return Ok(Outcome::Cancelled);
        }
        self.enrich(&mut candidates, criteria).await;

        if !self.advance(job_id, ProspectingStep::Storing).await? {
            return Ok(Outcome::Cancelled);
        }
        let (leads, emails) = self.store(job_id, candidates).await?;

        if !self.advance(job_id, ProspectingStep::Finalizing).await? {
            return Ok(Outcome::Cancelled);
        }
        let high_confidence = i64::from(self.enricher.config().high_confidence_score);
        let statistics = JobStatistics::compute(&leads, &emails, high_confidence);

        let total_leads = leads.len();
        let completed = prospecting_jobs::complete(
            pool,
            job_id,
            i64::try_from(total_leads).unwrap_or(i64::MAX),
            &serde_json::to_value(&statistics)?,
        )
        .await?;
        if completed {
            Ok(Outcome::Completed { total_leads })
        } else {
            Ok(Outcome::Cancelled)
        }
    }

    async fn scrape(&self, criteria: &SearchCriteria, limit: usize) -> Vec<ScrapedLead> {
        let query = criteria.scrape_query();
        if query.is_empty() {
            tracing::debug!(target: "prospecting", "No search terms for listing sites, skipping scrape");
            return Vec::new();
        }
        let location = criteria.location_text().unwrap_or_default();
        let scraped = self.scraper.scrape_leads(&query, &location, limit).await;
        filter_by_criteria(
            scraped,
            criteria.industry.as_deref(),
            criteria.city.as_deref(),
            criteria.state.as_deref(),
        )
    }

    async fn enrich(&self, candidates: &mut [Candidate], criteria: &SearchCriteria) {
        if criteria.enrich_data {
            let now = Utc::now();
            for candidate in candidates.iter_mut() {
                candidate.lead.enriched_at = Some(now);
            }
        }
        if !criteria.include_emails {
            return;
        }

        let targets: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.needs_email())
            .map(|(i, _)| i)
            .collect();
        let profiles: Vec<LeadProfile> = targets.iter().map(|&i| candidates[i].profile()).collect();
        let results = self.enricher.enrich_leads(&profiles).await;

        for (index, result) in targets.into_iter().zip(results) {
            let candidate = &mut candidates[index];
            candidate.lead.email.clone_from(&result.best_email);
            candidate.lead.best_email = result.best_email;
            candidate.lead.email_count = Some(i64::try_from(result.email_count).unwrap_or(i64::MAX));
            candidate.emails = result.emails.iter().map(stored_email).collect();
        }
    }

    /// Write candidates. A lead that fails to store is logged and skipped.
    async fn store(
        &self,
        job_id: i64,
        candidates: Vec<Candidate>,
    ) -> Result<(Vec<Lead>, Vec<NewLeadEmail>)> {
        let pool = self.db.pool();
        let mut stored = Vec::with_capacity(candidates.len());
        let mut emails = Vec::new();
        let mut seen = HashSet::new();

        for mut candidate in candidates {
            candidate.lead.prospecting_job_id = Some(job_id);
            if candidate.lead.source.is_none() {
                candidate.lead.source = Some(DEFAULT_SOURCE.to_string());
            }

            let written = match candidate.existing_id {
                Some(id) => leads::update(pool, id, &candidate.lead).await,
                None => leads::upsert(pool, &candidate.lead).await.map(Some),
            };
            let lead = match written {
                Ok(Some(lead)) => lead,
                Ok(None) => {
                    tracing::warn!(target: "prospecting", job_id, "Lead {} was deleted before it could be stored", candidate.company_name());
                    continue;
                }
                Err(e) => {
                    tracing::warn!(target: "prospecting", job_id, "Failed to store lead {}: {}", candidate.company_name(), e);
                    continue;
                }
            };

            if !candidate.emails.is_empty() {
                lead_emails::insert_many(pool, lead.id, &candidate.emails).await?;
            }
            // a listing can upsert into a row that was also found by the database search
            if seen.insert(lead.id) {
                emails.extend(candidate.emails);
                stored.push(lead);
            }
        }
        Ok((stored, emails))
    }

    /// Progress of `job_id` as a stream: `Connected`, then one event per poll
    /// until the job completes, fails, is cancelled or cannot be found.
    pub fn progress_events(
        &self,
        job_id: i64,
        poll_interval: Duration,
    ) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let db = Arc::clone(&self.db);
        stream::unfold(Some(PollState::Connect), move |state| {
            let db = Arc::clone(&db);
            async move {
                match state? {
                    PollState::Connect => Some((
                        ProgressEvent::connected(job_id),
                        Some(PollState::Poll { first: true }),
                    )),
                    PollState::Poll { first } => {
                        if !first {
                            tokio::time::sleep(poll_interval).await;
                        }
                        let event = match prospecting_jobs::get(db.pool(), job_id).await {
                            Ok(Some(job)) => ProgressEvent::from_job(&job),
                            Ok(None) => ProgressEvent::error("Job not found"),
                            Err(e) => ProgressEvent::error(e.to_string()),
                        };
                        let next = (!event.is_final()).then_some(PollState::Poll { first: false });
                        Some((event, next))
                    }
                }
            }
        })
    }

    /// Job statistics over `range`.
    pub async fn stats(&self, range: TimeRange) -> Result<JobStats> {
        let since = range.start_from(Utc::now());
        Ok(prospecting_jobs::stats_since(self.db.pool(), &since).await?)
    }

    /// A job with its stored lead count and age.
    pub async fn debug_info(&self, job_id: i64) -> Result<JobDebugInfo> {
        let job = prospecting_jobs::get(self.db.pool(), job_id)
            .await?
            .ok_or(ProspectingError::JobNotFound(job_id))?;
        let stored_leads = leads::count_by_job(self.db.pool(), job_id).await?;
        let job_age_minutes = (Utc::now() - job.created_at).num_minutes();
        Ok(JobDebugInfo {
            job,
            stored_leads,
            job_age_minutes,
            is_running: self.is_running(job_id).await,
        })
    }
}
