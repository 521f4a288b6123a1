//! Search criteria submitted to start a prospecting job.

use crate::error::{ProspectingError, Result};
use leadforge_core::ProspectingConfig;
use leadforge_db::leads::LeadSearch;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// What to prospect for. Every text field is optional, but at least one
/// must be present after [`SearchCriteria::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Contact job title
    #[serde(default)]
    pub title: Option<String>,
    /// Company name or fragment
    #[serde(default, alias = "companyName")]
    pub company_name: Option<String>,
    /// Free-form location
    #[serde(default)]
    pub location: Option<String>,
    /// Country
    #[serde(default)]
    pub country: Option<String>,
    /// City
    #[serde(default)]
    pub city: Option<String>,
    /// State or region
    #[serde(default)]
    pub state: Option<String>,
    /// Industry
    #[serde(default)]
    pub industry: Option<String>,
    /// Team size bucket
    #[serde(default, alias = "teamSize")]
    pub team_size: Option<String>,
    /// Revenue bucket
    #[serde(default, alias = "revenueRange")]
    pub revenue_range: Option<String>,
    /// Funding label
    #[serde(default, alias = "totalFunding")]
    pub total_funding: Option<String>,
    /// Result cap, clamped by [`SearchCriteria::prepare`]
    #[serde(default, alias = "maxResults")]
    pub max_results: Option<u32>,
    /// Generate and verify emails for leads without one
    #[serde(default = "default_true", alias = "includeEmails")]
    pub include_emails: bool,
    /// Stamp leads with an enrichment time
    #[serde(default = "default_true", alias = "enrichData")]
    pub enrich_data: bool,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            title: None,
            company_name: None,
            location: None,
            country: None,
            city: None,
            state: None,
            industry: None,
            team_size: None,
            revenue_range: None,
            total_funding: None,
            max_results: None,
            include_emails: true,
            enrich_data: true,
        }
    }
}

fn clean(value: &mut Option<String>) {
    *value = value
        .take()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
}

impl SearchCriteria {
    fn text_fields_mut(&mut self) -> [&mut Option<String>; 10] {
        [
            &mut self.title,
            &mut self.company_name,
            &mut self.location,
            &mut self.country,
            &mut self.city,
            &mut self.state,
            &mut self.industry,
            &mut self.team_size,
            &mut self.revenue_range,
            &mut self.total_funding,
        ]
    }

    /// Trim every text field and drop the empty ones.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        for field in self.text_fields_mut() {
            clean(field);
        }
        self
    }

    /// Whether any search criterion is set.
    #[must_use]
    pub fn has_criteria(&self) -> bool {
        [
            &self.title,
            &self.company_name,
            &self.location,
            &self.country,
            &self.city,
            &self.state,
            &self.industry,
            &self.team_size,
            &self.revenue_range,
            &self.total_funding,
        ]
        .iter()
        .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Reject criteria without a single search field.
    pub fn validate(&self) -> Result<()> {
        if self.has_criteria() {
            Ok(())
        } else {
            Err(ProspectingError::InvalidCriteria(
                "At least one search criteria must be provided".to_string(),
            ))
        }
    }

    /// Requested result cap, defaulted and clamped to the configured bounds.
    #[must_use]
    pub fn effective_max_results(&self, config: &ProspectingConfig) -> u32 {
        let min = config.min_results.min(config.max_results);
        self.max_results
            .unwrap_or(config.default_max_results)
            .clamp(min, config.max_results)
    }

    /// Normalize, validate and pin `max_results`.
    pub fn prepare(self, config: &ProspectingConfig) -> Result<Self> {
        let mut criteria = self.normalize();
        criteria.validate()?;
        criteria.max_results = Some(criteria.effective_max_results(config));
        Ok(criteria)
    }

    /// `city, state, country`, or the free-form location when none is set.
    #[must_use]
    pub fn location_text(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            self.location.clone()
        } else {
            Some(parts.join(", "))
        }
    }

    /// Human-readable summary such as `title:CTO location:Denver, CO industry:Software`.
    #[must_use]
    pub fn build_search_query(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(format!("title:{title}"));
        }
        if let Some(company) = &self.company_name {
            parts.push(format!("company:{company}"));
        }
        if let Some(location) = self.location_text() {
            parts.push(format!("location:{location}"));
        }
        let tagged = [
            ("industry", &self.industry),
            ("team_size", &self.team_size),
            ("revenue", &self.revenue_range),
            ("funding", &self.total_funding),
        ];
        for (tag, value) in tagged {
            if let Some(value) = value {
                parts.push(format!("{tag}:{value}"));
            }
        }
        parts.join(" ")
    }

    /// Terms sent to the listing sites: title, company and industry.
    #[must_use]
    pub fn scrape_query(&self) -> String {
        [&self.title, &self.company_name, &self.industry]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Equivalent search over stored leads.
    #[must_use]
    pub fn lead_search(&self) -> LeadSearch {
        LeadSearch {
            title: self.title.clone(),
            company: self.company_name.clone(),
            industry: self.industry.clone(),
            team_size: self.team_size.clone(),
            revenue_range: self.revenue_range.clone(),
            total_funding: self.total_funding.clone(),
            location: self
                .city
                .clone()
                .or_else(|| self.state.clone())
                .or_else(|| self.country.clone())
                .or_else(|| self.location.clone()),
            limit: self.max_results.unwrap_or(1),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn criteria() -> SearchCriteria {
        SearchCriteria {
            title: Some("  CTO ".into()),
            city: Some("Denver".into()),
            state: Some("CO".into()),
            industry: Some("Software".into()),
            total_funding: Some("".into()),
            ..SearchCriteria::default()
        }
    }

    #[test]
    fn test_deserialize_defaults() {
        let c: SearchCriteria = serde_json::from_str(r#"{"industry": "Retail"}"#).unwrap();
        assert!(c.include_emails);
        assert!(c.enrich_data);
        assert_eq!(c.max_results, None);

        let c: SearchCriteria =
            serde_json::from_str(r#"{"industry": "Retail", "include_emails": false}"#).unwrap();
        assert!(!c.include_emails);
    }

    #[test]
    fn test_normalize_trims_and_drops_empty() {
        let c = criteria().normalize();
        assert_eq!(c.title.as_deref(), Some("CTO"));
        assert_eq!(c.total_funding, None);
    }

    #[test]
    fn test_validate_requires_a_criterion() {
        let empty = SearchCriteria {
            title: Some("   ".into()),
            max_results: Some(50),
            ..SearchCriteria::default()
        }
        .normalize();
        assert!(matches!(
            empty.validate(),
            Err(ProspectingError::InvalidCriteria(_))
        ));
        assert!(criteria().validate().is_ok());
    }

    #[test]
    fn test_max_results_is_clamped() {
        let config = ProspectingConfig::default();
        let mut c = criteria();
        assert_eq!(c.effective_max_results(&config), 100);
        c.max_results = Some(3);
        assert_eq!(c.effective_max_results(&config), 10);
        c.max_results = Some(5000);
        assert_eq!(c.effective_max_results(&config), 1000);

        let prepared = criteria().prepare(&config).unwrap();
        assert_eq!(prepared.max_results, Some(100));
    }

    #[test]
    fn test_build_search_query() {
        let c = criteria().normalize();
        assert_eq!(
            c.build_search_query(),
            "title:CTO location:Denver, CO industry:Software"
        );

        let c = SearchCriteria {
            company_name: Some("Acme".into()),
            location: Some("Colorado".into()),
            revenue_range: Some("$1M-$10M".into()),
            ..SearchCriteria::default()
        };
        assert_eq!(
            c.build_search_query(),
            "company:Acme location:Colorado revenue:$1M-$10M"
        );
    }

    #[test]
    fn test_scrape_query_and_lead_search() {
        let c = criteria().prepare(&ProspectingConfig::default()).unwrap();
        assert_eq!(c.scrape_query(), "CTO Software");

        let search = c.lead_search();
        assert_eq!(search.location.as_deref(), Some("Denver"));
        assert_eq!(search.limit, 100);
        assert_eq!(search.industry.as_deref(), Some("Software"));
    }
}
