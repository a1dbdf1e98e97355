use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use tracing::{debug, info, warn};

use crate::config::{ScrapeSettings, SearchParams};
use crate::error::FetchError;
use crate::scrapers::traits::PageFetcher;

/// Search-results base URL (rental listing search endpoint)
pub const BASE_URL: &str = "https://suumo.jp/jj/chintai/ichiran/FR301FC001/";

/// CSS selector for one listing card on a results page
pub const CARD_SELECTOR: &str = "div.cassetteitem";

/// A headless Chrome instance scoped to one scrape cycle. Dropping the
/// session closes the browser.
pub struct BrowserSession {
    browser: Browser,
}

impl BrowserSession {
    pub fn launch() -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self { browser })
    }
}

/// Fetches rendered results pages through a [`BrowserSession`], applying the
/// fixed search-filter parameters to every page URL.
pub struct RenderedPageFetcher<'a> {
    session: &'a BrowserSession,
    query: String,
    render_timeout: Duration,
}

impl<'a> RenderedPageFetcher<'a> {
    pub fn new(session: &'a BrowserSession, params: &SearchParams, settings: &ScrapeSettings) -> Self {
        Self {
            session,
            query: params.to_query(),
            render_timeout: Duration::from_secs(settings.render_timeout_secs),
        }
    }

    /// Results URL for a 1-based page index.
    pub fn page_url(&self, page: u32) -> String {
        build_page_url(&self.query, page)
    }
}

/// Results URL for a query-string fragment and 1-based page index.
pub fn build_page_url(query: &str, page: u32) -> String {
    if query.is_empty() {
        format!("{}?page={}", BASE_URL, page)
    } else {
        format!("{}?{}&page={}", BASE_URL, query, page)
    }
}

#[async_trait]
impl PageFetcher for RenderedPageFetcher<'_> {
    async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
        let url = self.page_url(page);
        debug!("Fetching page {}: {}", page, url);

        let tab = self
            .session
            .browser
            .new_tab()
            .map_err(|e| FetchError::Navigation { page, reason: e.to_string() })?;

        tab.navigate_to(&url)
            .map_err(|e| FetchError::Navigation { page, reason: e.to_string() })?;
        tab.wait_until_navigated()
            .map_err(|_| FetchError::RenderTimeout { page })?;

        // Listing cards render after navigation settles. A page past the end
        // of the results legitimately has none, so a missed wait is not a
        // fetch failure; the parser reports the empty page.
        if tab
            .wait_for_element_with_custom_timeout(CARD_SELECTOR, self.render_timeout)
            .is_err()
        {
            debug!("No listing cards appeared on page {} within timeout", page);
        }

        let html_result = tab
            .evaluate("document.documentElement.outerHTML", false)
            .map_err(|e| FetchError::Capture { page, reason: e.to_string() })?;

        let html = match html_result.value.as_ref().and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                warn!("Captured empty document for page {}", page);
                return Err(FetchError::Capture {
                    page,
                    reason: "document outerHTML was empty".to_string(),
                });
            }
        };

        let _ = tab.close(true);

        Ok(html)
    }
}
