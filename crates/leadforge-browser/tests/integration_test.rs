use leadforge_browser::{BrowserEngine, PageFetcher};
use leadforge_core::{BrowserConfig, ScrapingConfig};

async fn engine() -> BrowserEngine {
    BrowserEngine::launch(&BrowserConfig::default(), &ScrapingConfig::default())
        .await
        .expect("launch browser")
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_browser_engine_launch() {
    let engine = engine().await;
    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_fetch_page_content() {
    let engine = engine().await;
    let html = engine
        .fetch("https://example.com", Some("h1"))
        .await
        .expect("fetch example.com");
    assert!(html.contains("Example Domain"));
    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_missing_selector_times_out() {
    let mut settings = BrowserConfig::default();
    settings.selector_timeout_ms = 500;
    let engine = BrowserEngine::launch(&settings, &ScrapingConfig::default())
        .await
        .expect("launch browser");

    let result = engine
        .fetch("https://example.com", Some(".does-not-exist"))
        .await;
    assert!(result.is_err());
    engine.shutdown().await.expect("shutdown");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_each_fetch_goes_through_next_proxy() {
    // Nothing listens on port 9, so every fetch fails only if each one is
    // routed through a proxy.
    let scraping = ScrapingConfig {
        proxies: vec!["http://127.0.0.1:9".to_string(), "http://127.0.0.1:9".to_string()],
        ..ScrapingConfig::default()
    };
    let mut settings = BrowserConfig::default();
    settings.navigation_timeout_secs = 5;
    let engine = BrowserEngine::launch(&settings, &scraping)
        .await
        .expect("launch browser");
    assert_eq!(engine.proxies().len(), 2);

    for _ in 0..3 {
        assert!(engine.fetch("http://example.com", None).await.is_err());
    }
    engine.shutdown().await.expect("shutdown");
}
