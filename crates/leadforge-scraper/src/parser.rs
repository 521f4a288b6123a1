use crate::error::{Result, ScrapeError};
use crate::sources::{Field, Source, SourceDefinition};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// One business listing read from a source's result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedBusiness {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub rating: Option<String>,
    pub funding: Option<String>,
    pub category: Option<String>,
    pub company_size: Option<String>,
    pub source: Source,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedBusiness {
    fn new(name: String, source: Source) -> Self {
        Self {
            name,
            address: None,
            phone: None,
            website: None,
            description: None,
            industry: None,
            location: None,
            rating: None,
            funding: None,
            category: None,
            company_size: None,
            source,
            scraped_at: Utc::now(),
        }
    }

    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Address => &mut self.address,
            Field::Phone => &mut self.phone,
            Field::Website => &mut self.website,
            Field::Description => &mut self.description,
            Field::Industry => &mut self.industry,
            Field::Location => &mut self.location,
            Field::Rating => &mut self.rating,
            Field::Funding => &mut self.funding,
            Field::Category => &mut self.category,
            Field::CompanySize => &mut self.company_size,
        };
        *slot = Some(value);
    }
}

/// Reads listings out of a result page using a source's selectors.
pub struct ResultParser<'a> {
    definition: &'a SourceDefinition,
}

impl<'a> ResultParser<'a> {
    pub fn new(definition: &'a SourceDefinition) -> Self {
        Self { definition }
    }

    /// Parse up to `limit` listings from `html`.
    pub fn parse(&self, html: &str, limit: usize) -> Result<Vec<ScrapedBusiness>> {
        let document = Html::parse_document(html);
        let item_selector = self.selector(self.definition.item, "item")?;
        let name_selector = self.selector(self.definition.name, "name")?;
        let fields = self
            .definition
            .fields
            .iter()
            .map(|f| Ok((f, self.selector(f.css, "field")?)))
            .collect::<Result<Vec<_>>>()?;

        let mut businesses = Vec::new();
        for item in document.select(&item_selector) {
            if businesses.len() >= limit {
                break;
            }
            let Some(name) = first_text(&item, &name_selector) else {
                continue;
            };

            let mut business = ScrapedBusiness::new(name, self.definition.source);
            for (field, selector) in &fields {
                let value = match field.attr {
                    Some(attr) => item
                        .select(selector)
                        .next()
                        .and_then(|el| el.value().attr(attr))
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty()),
                    None => first_text(&item, selector),
                };
                if let Some(value) = value {
                    business.set(field.field, value);
                }
            }
            businesses.push(business);
        }

        Ok(businesses)
    }

    fn selector(&self, css: &str, kind: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| ScrapeError::SelectorsOutdated {
            source_name: self.definition.source.to_string(),
            reason: format!("Invalid {kind} selector {css}: {e:?}"),
        })
    }
}

/// Whitespace-collapsed text of the first match, if non-empty.
fn first_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sources::FieldSelector;

    const YELLOW_PAGES_HTML: &str = r#"
        <div class="search-results">
            <div class="result">
                <a class="business-name"><span>Mile High  Plumbing</span></a>
                <div class="phones">(303) 555-0100</div>
                <div class="street-address">123 Main St</div>
                <div class="locality">Denver, CO 80202</div>
                <div class="categories">Plumbers, Water Heaters</div>
                <a class="track-visit-website" href="https://milehighplumbing.com">Website</a>
            </div>
            <div class="result">
                <div class="phones">(303) 555-0199</div>
            </div>
            <div class="result">
                <a class="business-name">Front Range Pipes</a>
            </div>
        </div>
    "#;

    #[test]
    fn test_parse_yellow_pages() {
        let parser = ResultParser::new(Source::YellowPages.definition());
        let businesses = parser.parse(YELLOW_PAGES_HTML, 20).expect("parse");

        assert_eq!(businesses.len(), 2);
        let first = &businesses[0];
        assert_eq!(first.name, "Mile High Plumbing");
        assert_eq!(first.phone.as_deref(), Some("(303) 555-0100"));
        assert_eq!(first.address.as_deref(), Some("123 Main St"));
        assert_eq!(first.location.as_deref(), Some("Denver, CO 80202"));
        assert_eq!(first.website.as_deref(), Some("https://milehighplumbing.com"));
        assert_eq!(first.source, Source::YellowPages);

        assert_eq!(businesses[1].name, "Front Range Pipes");
        assert!(businesses[1].phone.is_none());
    }

    #[test]
    fn test_parse_respects_limit() {
        let parser = ResultParser::new(Source::YellowPages.definition());
        let businesses = parser.parse(YELLOW_PAGES_HTML, 1).unwrap();
        assert_eq!(businesses.len(), 1);
    }

    #[test]
    fn test_attribute_fields() {
        let html = r#"
            <div data-testid="serp-ia-card">
                <h3>Sunrise Cafe</h3>
                <div aria-label="4.5 star rating"></div>
                <p data-testid="category-str-list">Breakfast &amp; Brunch</p>
            </div>
        "#;
        let parser = ResultParser::new(Source::Yelp.definition());
        let businesses = parser.parse(html, 10).unwrap();
        assert_eq!(businesses[0].rating.as_deref(), Some("4.5 star rating"));
        assert_eq!(businesses[0].category.as_deref(), Some("Breakfast & Brunch"));
    }

    #[test]
    fn test_empty_page() {
        let parser = ResultParser::new(Source::Crunchbase.definition());
        assert!(parser.parse("<html><body></body></html>", 10).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_is_outdated() {
        static BROKEN: SourceDefinition = SourceDefinition {
            source: Source::Glassdoor,
            domain: "glassdoor.com",
            url_template: "",
            item: "div[[",
            name: ".name",
            fields: &[FieldSelector {
                field: Field::Rating,
                css: ".rating",
                attr: None,
            }],
            limit: None,
        };
        let err = ResultParser::new(&BROKEN).parse("<div></div>", 10).unwrap_err();
        assert!(matches!(err, ScrapeError::SelectorsOutdated { .. }));
    }
}
