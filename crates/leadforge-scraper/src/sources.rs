//! Lead sources and how to search and read each of them.

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A site business listings are scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Google Maps business search
    GoogleMaps,
    /// LinkedIn company search
    #[serde(rename = "linkedin")]
    LinkedIn,
    /// Yelp business search
    Yelp,
    /// Yellow Pages directory
    #[serde(rename = "yellowpages")]
    YellowPages,
    /// Crunchbase company search
    Crunchbase,
    /// Indeed job board
    Indeed,
    /// Glassdoor company search
    Glassdoor,
}

impl Source {
    /// Every source, in scraping order.
    pub const ALL: [Self; 7] = [
        Self::GoogleMaps,
        Self::LinkedIn,
        Self::Yelp,
        Self::YellowPages,
        Self::Crunchbase,
        Self::Indeed,
        Self::Glassdoor,
    ];

    /// The job board sources.
    pub const JOB_BOARDS: [Self; 2] = [Self::Indeed, Self::Glassdoor];

    /// Stable name used in requests, storage and lead provenance.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoogleMaps => "google_maps",
            Self::LinkedIn => "linkedin",
            Self::Yelp => "yelp",
            Self::YellowPages => "yellowpages",
            Self::Crunchbase => "crunchbase",
            Self::Indeed => "indeed",
            Self::Glassdoor => "glassdoor",
        }
    }

    /// Expand a list of names, where `all` and `job_boards` are groups.
    ///
    /// The result keeps first-seen order without duplicates.
    ///
    /// # Errors
    /// `UnknownSource` for any unrecognized name.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Self>> {
        let mut sources = Vec::new();
        for name in names {
            let expanded: Vec<Self> = match name.as_ref().trim() {
                "all" => Self::ALL.to_vec(),
                "job_boards" => Self::JOB_BOARDS.to_vec(),
                other => vec![other.parse()?],
            };
            for source in expanded {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }
        Ok(sources)
    }

    /// Search and parsing rules for this source.
    #[must_use]
    pub fn definition(self) -> &'static SourceDefinition {
        match self {
            Self::GoogleMaps => &GOOGLE_MAPS,
            Self::LinkedIn => &LINKEDIN,
            Self::Yelp => &YELP,
            Self::YellowPages => &YELLOW_PAGES,
            Self::Crunchbase => &CRUNCHBASE,
            Self::Indeed => &INDEED,
            Self::Glassdoor => &GLASSDOOR,
        }
    }
}

impl FromStr for Source {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| ScrapeError::UnknownSource(s.to_string()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing fields besides the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Street address
    Address,
    /// Phone number
    Phone,
    /// Company website
    Website,
    /// Free-text description
    Description,
    /// Industry
    Industry,
    /// City/region text
    Location,
    /// Rating text
    Rating,
    /// Funding summary
    Funding,
    /// Category list
    Category,
    /// Company size
    CompanySize,
}

/// Where a field lives inside a result item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelector {
    /// Field being read
    pub field: Field,
    /// CSS selector relative to the item
    pub css: &'static str,
    /// Attribute to read instead of the text content
    pub attr: Option<&'static str>,
}

const fn text(field: Field, css: &'static str) -> FieldSelector {
    FieldSelector {
        field,
        css,
        attr: None,
    }
}

const fn attr(field: Field, css: &'static str, attr: &'static str) -> FieldSelector {
    FieldSelector {
        field,
        css,
        attr: Some(attr),
    }
}

/// How to search a source and read its result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefinition {
    /// Source described
    pub source: Source,
    /// Rate-limited domain
    pub domain: &'static str,
    /// Search URL with `{query}`, `{location}` or `{query_location}` placeholders
    pub url_template: &'static str,
    /// One result item; also waited for after navigation
    pub item: &'static str,
    /// Company name within an item; items without one are skipped
    pub name: &'static str,
    /// Other fields
    pub fields: &'static [FieldSelector],
    /// Fixed result cap; `None` uses the configured per-source cap
    pub limit: Option<usize>,
}

impl SourceDefinition {
    /// Search URL with the query and location URL-encoded.
    #[must_use]
    pub fn search_url(&self, query: &str, location: &str) -> String {
        let combined = format!("{query} {location}");
        self.url_template
            .replace("{query_location}", &urlencoding::encode(combined.trim()))
            .replace("{query}", &urlencoding::encode(query.trim()))
            .replace("{location}", &urlencoding::encode(location.trim()))
    }

    /// Result cap for this source.
    #[must_use]
    pub fn result_limit(&self, results_per_source: usize) -> usize {
        self.limit.unwrap_or(results_per_source)
    }
}

static GOOGLE_MAPS: SourceDefinition = SourceDefinition {
    source: Source::GoogleMaps,
    domain: "google.com",
    url_template: "https://www.google.com/maps/search/{query_location}",
    item: "[data-value=\"Business\"]",
    name: "h3",
    fields: &[
        text(Field::Address, "[data-item-id*=\"address\"]"),
        text(Field::Phone, "[data-item-id*=\"phone\"]"),
        attr(Field::Website, "[data-item-id*=\"website\"]", "href"),
    ],
    limit: Some(20),
};

static LINKEDIN: SourceDefinition = SourceDefinition {
    source: Source::LinkedIn,
    domain: "linkedin.com",
    url_template: "https://www.linkedin.com/search/results/companies/?keywords={query}",
    item: ".search-result__info",
    name: ".search-result__title",
    fields: &[
        text(Field::Description, ".search-result__description"),
        text(Field::Location, ".search-result__location"),
        text(Field::Industry, ".search-result__industry"),
    ],
    limit: Some(10),
};

static YELP: SourceDefinition = SourceDefinition {
    source: Source::Yelp,
    domain: "yelp.com",
    url_template: "https://www.yelp.com/search?find_desc={query}&find_loc={location}",
    item: "[data-testid=\"serp-ia-card\"]",
    name: "h3",
    fields: &[
        attr(Field::Rating, "[aria-label*=\"rating\"]", "aria-label"),
        text(Field::Category, "[data-testid=\"category-str-list\"]"),
        text(Field::Address, "address"),
    ],
    limit: None,
};

static YELLOW_PAGES: SourceDefinition = SourceDefinition {
    source: Source::YellowPages,
    domain: "yellowpages.com",
    url_template:
        "https://www.yellowpages.com/search?search_terms={query}&geo_location_terms={location}",
    item: ".result",
    name: ".business-name",
    fields: &[
        text(Field::Phone, ".phones"),
        text(Field::Address, ".street-address"),
        text(Field::Location, ".locality"),
        text(Field::Category, ".categories"),
        attr(Field::Website, ".track-visit-website", "href"),
    ],
    limit: None,
};

static CRUNCHBASE: SourceDefinition = SourceDefinition {
    source: Source::Crunchbase,
    domain: "crunchbase.com",
    url_template: "https://www.crunchbase.com/search/companies?q={query}",
    item: ".result-card",
    name: ".result-card-title",
    fields: &[
        text(Field::Description, ".result-card-description"),
        text(Field::Funding, ".funding-info"),
        text(Field::Industry, ".industry"),
    ],
    limit: None,
};

static INDEED: SourceDefinition = SourceDefinition {
    source: Source::Indeed,
    domain: "indeed.com",
    url_template: "https://www.indeed.com/jobs?q={query}&l={location}",
    item: ".job_seen_beacon",
    name: ".companyName",
    fields: &[
        text(Field::Description, ".jobTitle"),
        text(Field::Location, ".companyLocation"),
    ],
    limit: None,
};

static GLASSDOOR: SourceDefinition = SourceDefinition {
    source: Source::Glassdoor,
    domain: "glassdoor.com",
    url_template: "https://www.glassdoor.com/Search/results.htm?keyword={query}",
    item: ".company-tile",
    name: ".company-name",
    fields: &[
        text(Field::Rating, ".rating"),
        text(Field::Industry, ".industry"),
        text(Field::CompanySize, ".company-size"),
    ],
    limit: None,
};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("google_maps".parse::<Source>().unwrap(), Source::GoogleMaps);
        assert_eq!("yellowpages".parse::<Source>().unwrap(), Source::YellowPages);
        assert!(matches!(
            "myspace".parse::<Source>(),
            Err(ScrapeError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_parse_list_groups() {
        let sources = Source::parse_list(&["yelp", "job_boards", "indeed"]).unwrap();
        assert_eq!(sources, vec![Source::Yelp, Source::Indeed, Source::Glassdoor]);

        let all = Source::parse_list(&["all"]).unwrap();
        assert_eq!(all.len(), 7);

        assert!(Source::parse_list(&["yelp", "bogus"]).is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        for source in Source::ALL {
            let json = serde_json::to_string(&source).unwrap();
            assert_eq!(json, format!("\"{source}\""));
        }
    }

    #[test]
    fn test_search_urls() {
        let url = Source::GoogleMaps
            .definition()
            .search_url("coffee shops", "Denver, CO");
        assert_eq!(
            url,
            "https://www.google.com/maps/search/coffee%20shops%20Denver%2C%20CO"
        );

        let url = Source::Yelp.definition().search_url("plumbers", "");
        assert_eq!(url, "https://www.yelp.com/search?find_desc=plumbers&find_loc=");

        let url = Source::GoogleMaps.definition().search_url("bakery", "");
        assert!(url.ends_with("/bakery"));
    }

    #[test]
    fn test_result_limits() {
        assert_eq!(Source::GoogleMaps.definition().result_limit(5), 20);
        assert_eq!(Source::LinkedIn.definition().result_limit(5), 10);
        assert_eq!(Source::Yelp.definition().result_limit(5), 5);
    }

    #[test]
    fn test_definitions_match_sources() {
        for source in Source::ALL {
            assert_eq!(source.definition().source, source);
        }
    }
}
