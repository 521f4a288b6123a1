use crate::actions::{extract_domain, PageFetcher};
use crate::error::{BrowserError, Result};
use crate::fingerprint::{FingerprintConfig, ProxyRotator};
use crate::rate_limit::{DomainLimit, DomainRateLimiter};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures::StreamExt;
use leadforge_core::{BrowserConfig as BrowserSettings, ScrapingConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const LAUNCH_ARGS: [&str; 6] = [
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--no-first-run",
    "--no-zygote",
    "--disable-gpu",
];

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Headless Chromium shared by all scrapers.
pub struct BrowserEngine {
    browser: Browser,
    handler: JoinHandle<()>,
    rate_limiter: Arc<DomainRateLimiter>,
    proxies: ProxyRotator,
    navigation_timeout: Duration,
    selector_timeout: Duration,
}

impl BrowserEngine {
    /// Launch Chromium with the default domain limits from `scraping`.
    pub async fn launch(settings: &BrowserSettings, scraping: &ScrapingConfig) -> Result<Self> {
        let limiter = DomainRateLimiter::with_defaults(DomainLimit::from(scraping));
        let proxies = ProxyRotator::new(scraping.proxies.clone());
        Self::with_rate_limiter(settings, Arc::new(limiter), proxies).await
    }

    /// Launch Chromium sharing an existing rate limiter.
    ///
    /// With proxies configured, each fetch runs in its own browser context
    /// bound to the next proxy in turn.
    pub async fn with_rate_limiter(
        settings: &BrowserSettings,
        rate_limiter: Arc<DomainRateLimiter>,
        proxies: ProxyRotator,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .args(LAUNCH_ARGS);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser handler event error: {}", e);
                }
            }
        });

        tracing::info!(
            "Browser engine started (headless: {}, proxies: {})",
            settings.headless,
            proxies.len()
        );
        Ok(Self {
            browser,
            handler,
            rate_limiter,
            proxies,
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            selector_timeout: Duration::from_millis(settings.selector_timeout_ms),
        })
    }

    /// The limiter consulted before every navigation.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<DomainRateLimiter> {
        &self.rate_limiter
    }

    /// Proxies rotated across fetches.
    #[must_use]
    pub fn proxies(&self) -> &ProxyRotator {
        &self.proxies
    }

    /// Rendered HTML of `url`.
    ///
    /// Waits for the domain's rate-limit token, opens a page with a random
    /// fingerprint (in a context on the next proxy, when proxies are set), and
    /// waits for `wait_selector` when given. The page and its context are
    /// closed whether or not loading succeeds.
    pub async fn fetch_page_content(&self, url: &str, wait_selector: Option<&str>) -> Result<String> {
        let domain = extract_domain(url)?;
        self.rate_limiter.acquire(&domain).await;

        let context = match self.proxies.next_proxy() {
            Some(proxy) => Some(self.proxy_context(proxy).await?),
            None => None,
        };
        let mut target = CreateTargetParams::builder().url("about:blank");
        if let Some(id) = &context {
            target = target.browser_context_id(id.clone());
        }
        let target = target.build().map_err(BrowserError::ChromiumError)?;

        let result = match self.browser.new_page(target).await {
            Ok(page) => {
                let result = self.load(&page, url, wait_selector).await;
                if let Err(e) = page.close().await {
                    tracing::debug!("Failed to close page for {}: {}", url, e);
                }
                result
            }
            Err(e) => Err(BrowserError::ChromiumError(e.to_string())),
        };
        if let Some(id) = context {
            if let Err(e) = self.browser.execute(DisposeBrowserContextParams::new(id)).await {
                tracing::debug!("Failed to dispose browser context: {}", e);
            }
        }
        result
    }

    async fn proxy_context(&self, proxy: &str) -> Result<BrowserContextId> {
        tracing::debug!("Opening browser context through proxy {}", proxy);
        let params = CreateBrowserContextParams::builder()
            .proxy_server(proxy)
            .build();
        let created = self
            .browser
            .execute(params)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(created.result.browser_context_id)
    }

    async fn load(&self, page: &Page, url: &str, wait_selector: Option<&str>) -> Result<String> {
        let fingerprint = FingerprintConfig::randomized();
        page.set_user_agent(SetUserAgentOverrideParams::new(
            fingerprint.user_agent.clone(),
        ))
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(fingerprint.viewport_width),
            i64::from(fingerprint.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        tracing::debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, page.goto(url)).await {
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} exceeded {}s",
                    self.navigation_timeout.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(BrowserError::NavigationError(e.to_string())),
            Ok(Ok(_)) => {}
        }

        if let Some(selector) = wait_selector {
            self.wait_for_selector(page, selector).await?;
        }

        page.content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn wait_for_selector(&self, page: &Page, selector: &str) -> Result<()> {
        let deadline = Instant::now() + self.selector_timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::SelectorNotFound(selector.to_string()));
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    /// Close the browser and stop its handler.
    pub async fn shutdown(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        self.handler.abort();
        tracing::info!("Browser engine stopped");
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageFetcher for BrowserEngine {
    async fn fetch(&self, url: &str, wait_selector: Option<&str>) -> Result<String> {
        self.fetch_page_content(url, wait_selector).await
    }
}
