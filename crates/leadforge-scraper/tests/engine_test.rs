use leadforge_browser::{BrowserError, PageFetcher};
use leadforge_core::ScrapingConfig;
use leadforge_scraper::{ScrapingEngine, Source};
use std::sync::{Arc, Mutex};

const YELP_HTML: &str = r#"
    <div data-testid="serp-ia-card">
        <h3>Sunrise Cafe</h3>
        <p data-testid="category-str-list">Coffee &amp; Tea</p>
    </div>
    <div data-testid="serp-ia-card">
        <h3>Blue Door Coffee</h3>
    </div>
"#;

const YELLOW_PAGES_HTML: &str = r#"
    <div class="result">
        <a class="business-name">Sunrise Cafe</a>
        <div class="phones">(720) 555-0142</div>
        <div class="street-address">88 Larimer St</div>
        <div class="locality">Denver, CO 80205</div>
        <a class="track-visit-website" href="https://www.sunrisecafe.com">Website</a>
    </div>
    <div class="result">
        <a class="business-name">Sunrise Cafe</a>
        <a class="track-visit-website" href="https://www.sunrisecafe.com">Website</a>
    </div>
"#;

/// Serves canned pages by domain and records requested URLs.
struct FakeFetcher {
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _wait_selector: Option<&str>) -> leadforge_browser::Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        if url.contains("yelp.com") {
            Ok(YELP_HTML.to_string())
        } else if url.contains("yellowpages.com") {
            Ok(YELLOW_PAGES_HTML.to_string())
        } else if url.contains("linkedin.com") {
            Err(BrowserError::SelectorNotFound(".search-result__info".to_string()))
        } else {
            Ok("<html></html>".to_string())
        }
    }
}

fn config(sources: &[&str]) -> ScrapingConfig {
    ScrapingConfig {
        sources: sources.iter().map(ToString::to_string).collect(),
        ..ScrapingConfig::default()
    }
}

#[tokio::test]
async fn test_bulk_scrape_collects_per_source() {
    let fetcher = Arc::new(FakeFetcher::new());
    let engine = ScrapingEngine::new(fetcher.clone(), &config(&["all"])).expect("engine");

    let bulk = engine
        .bulk_scrape(
            "coffee",
            "Denver, CO",
            &[Source::Yelp, Source::YellowPages, Source::LinkedIn],
        )
        .await;

    assert_eq!(bulk.results.len(), 3);
    assert_eq!(bulk.results[&Source::Yelp].len(), 2);
    assert_eq!(bulk.results[&Source::YellowPages].len(), 2);
    assert!(bulk.results[&Source::LinkedIn].is_empty(), "failed source yields nothing");
    assert_eq!(bulk.total_results, 4);
    assert_eq!(fetcher.requests.lock().unwrap().len(), 3);

    let json = serde_json::to_value(&bulk).expect("serialize");
    assert_eq!(json["yelp"][0]["name"], "Sunrise Cafe");
    assert_eq!(json["total_results"], 4);
}

#[tokio::test]
async fn test_scrape_leads_dedups_and_scores() {
    let fetcher = Arc::new(FakeFetcher::new());
    let engine =
        ScrapingEngine::new(fetcher, &config(&["yelp", "yellowpages"])).expect("engine");

    let leads = engine.scrape_leads("coffee", "Denver", 10).await;
    let names: Vec<_> = leads.iter().map(|l| l.company_name.as_str()).collect();
    // Yelp's Sunrise Cafe has no website, so it is distinct from the
    // Yellow Pages listing; the second Yellow Pages listing is a duplicate.
    assert_eq!(names, vec!["Sunrise Cafe", "Blue Door Coffee", "Sunrise Cafe"]);

    let listed = &leads[2];
    assert_eq!(listed.source, "yellowpages");
    assert_eq!(listed.domain.as_deref(), Some("sunrisecafe.com"));
    assert_eq!(listed.city.as_deref(), Some("Denver"));
    assert_eq!(listed.state.as_deref(), Some("CO"));
    assert!((listed.quality_score - 0.9).abs() < f64::EPSILON);

    assert_eq!(leads[0].industry.as_deref(), Some("Coffee & Tea"));

    let capped = engine.scrape_leads("coffee", "Denver", 1).await;
    assert_eq!(capped.len(), 1);
}

#[tokio::test]
async fn test_unknown_configured_source() {
    let fetcher = Arc::new(FakeFetcher::new());
    assert!(ScrapingEngine::new(fetcher, &config(&["friendster"])).is_err());
}
