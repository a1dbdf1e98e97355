use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ScrapeSettings;
use crate::models::ScrapeOutcome;
use crate::scrapers::normalize::normalize;
use crate::scrapers::parser::parse_listing_cards;
use crate::scrapers::traits::PageFetcher;

/// Walks the paginated results in increasing page order, accumulating
/// normalized listings until the site runs out of pages, the page bound is
/// hit, or a page fetch exhausts its retry budget.
pub struct PaginationDriver<'a> {
    fetcher: &'a dyn PageFetcher,
    settings: &'a ScrapeSettings,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, settings: &'a ScrapeSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Scrape every results page. Never fails outright: an unrecoverable
    /// fetch ends the scan with whatever was accumulated and the partial
    /// flag set, since a partial scrape is still worth persisting.
    pub async fn run(&self) -> ScrapeOutcome {
        let mut outcome = ScrapeOutcome::default();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for page in 1..=self.settings.max_pages {
            if page > 1 {
                // Politeness pause between consecutive page fetches
                tokio::time::sleep(Duration::from_millis(self.settings.politeness_delay_ms)).await;
            }

            let html = match self.fetch_with_retries(page).await {
                Some(html) => html,
                None => {
                    warn!(
                        "Giving up on page {} after {} attempts, keeping {} listings scraped so far",
                        page,
                        self.settings.retry_attempts,
                        outcome.listings.len()
                    );
                    outcome.partial = true;
                    break;
                }
            };
            outcome.pages_fetched += 1;

            let cards = parse_listing_cards(&html, page);
            if cards.is_empty() {
                info!("Page {} has no listing cards, scan complete", page);
                break;
            }

            let mut added = 0usize;
            for raw in cards {
                match normalize(raw, page) {
                    Ok(listing) => {
                        // First occurrence wins within one run
                        if seen_urls.insert(listing.url.clone()) {
                            outcome.listings.push(listing);
                            added += 1;
                        } else {
                            debug!("Duplicate url {} on page {}, keeping first", listing.url, page);
                        }
                    }
                    Err(e) => warn!("Skipping card: {}", e),
                }
            }

            info!(
                "Page {}: {} listings ({} total)",
                page,
                added,
                outcome.listings.len()
            );

            if page == self.settings.max_pages {
                warn!("Reached the page bound ({}), stopping", self.settings.max_pages);
            }
        }

        info!(
            "Scrape finished: {} listings over {} pages{}",
            outcome.listings.len(),
            outcome.pages_fetched,
            if outcome.partial { " (partial)" } else { "" }
        );
        outcome
    }

    async fn fetch_with_retries(&self, page: u32) -> Option<String> {
        for attempt in 1..=self.settings.retry_attempts {
            match self.fetcher.fetch_page(page).await {
                Ok(html) => return Some(html),
                Err(e) => {
                    warn!(
                        "Fetch attempt {}/{} for page {} failed: {}",
                        attempt, self.settings.retry_attempts, page, e
                    );
                    if attempt < self.settings.retry_attempts {
                        tokio::time::sleep(Duration::from_millis(self.settings.retry_backoff_ms))
                            .await;
                    }
                }
            }
        }
        None
    }
}
