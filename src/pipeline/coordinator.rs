use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::ScrapeSettings;
use crate::error::CollaboratorError;
use crate::models::PropertyListing;
use crate::pipeline::detector;
use crate::scrapers::{PageFetcher, PaginationDriver};

/// Persisted listing state, keyed by url. The sheet is also edited by a
/// human between runs, so the adapter behind this trait must preserve
/// unrelated regions.
#[async_trait]
pub trait SheetStore: Send + Sync {
    async fn read_known_urls(&self) -> Result<HashSet<String>, CollaboratorError>;

    /// Upsert all rows keyed by url and visually flag those in `new_urls`.
    async fn write_listings(
        &self,
        listings: &[PropertyListing],
        new_urls: &HashSet<String>,
    ) -> Result<(), CollaboratorError>;
}

/// Digest delivery for newly observed listings.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_listings(
        &self,
        listings: &[PropertyListing],
    ) -> Result<(), CollaboratorError>;
}

/// What one cycle did, for the caller's logs.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub total: usize,
    pub new_count: usize,
    pub partial: bool,
    pub persisted: bool,
    pub notified: bool,
}

/// Run one full cycle: scrape → rehydrate known urls → diff → persist →
/// notify. Collaborator failures are logged and end the cycle cleanly;
/// nothing here may take down the host process, the next scheduled cycle
/// must always get its turn.
pub async fn run_cycle(
    fetcher: &dyn PageFetcher,
    settings: &ScrapeSettings,
    sheet: &dyn SheetStore,
    notifier: &dyn Notifier,
) -> CycleReport {
    let outcome = PaginationDriver::new(fetcher, settings).run().await;

    let mut report = CycleReport {
        total: outcome.listings.len(),
        partial: outcome.partial,
        ..Default::default()
    };

    if outcome.listings.is_empty() {
        info!("Scrape produced no listings, nothing to persist");
        return report;
    }

    let known_urls = match sheet.read_known_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            error!("Could not read known urls from the sheet, ending cycle: {}", e);
            return report;
        }
    };
    info!("{} urls known from the previous run", known_urls.len());

    let delta = detector::detect(&outcome.listings, known_urls);
    report.new_count = delta.new_listings.len();
    info!("{} of {} listings are new", report.new_count, report.total);

    let new_urls: HashSet<String> = delta
        .new_listings
        .iter()
        .map(|l| l.url.clone())
        .collect();

    if let Err(e) = sheet.write_listings(&outcome.listings, &new_urls).await {
        error!("Could not persist listings to the sheet, ending cycle: {}", e);
        return report;
    }
    report.persisted = true;

    if delta.new_listings.is_empty() {
        return report;
    }

    match notifier.notify_new_listings(&delta.new_listings).await {
        Ok(()) => {
            info!("Notified operator about {} new listings", report.new_count);
            report.notified = true;
        }
        // Delivery is best-effort; the persisted sheet already has the data
        Err(e) => warn!("Notification failed: {}", e),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::Mutex;

    struct FixtureFetcher {
        pages: Vec<Result<String, ()>>,
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn fetch_page(&self, page: u32) -> Result<String, FetchError> {
            match self.pages.get((page - 1) as usize) {
                Some(Ok(html)) => Ok(html.clone()),
                _ => Err(FetchError::RenderTimeout { page }),
            }
        }
    }

    fn page_with_urls(urls: &[&str]) -> String {
        let cards: Vec<String> = urls
            .iter()
            .map(|u| {
                format!(
                    r#"<div class="cassetteitem">
                        <span class="cassetteitem_price--rent">8万円</span>
                        <a class="js-cassette_link_href" href="{u}"></a>
                    </div>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", cards.join(""))
    }

    fn empty_page() -> String {
        "<html><body></body></html>".to_string()
    }

    #[derive(Default)]
    struct RecordingSheet {
        known: Vec<String>,
        fail_read: bool,
        fail_write: bool,
        writes: Mutex<Vec<(Vec<String>, Vec<String>)>>,
    }

    #[async_trait]
    impl SheetStore for RecordingSheet {
        async fn read_known_urls(&self) -> Result<HashSet<String>, CollaboratorError> {
            if self.fail_read {
                return Err(CollaboratorError::Sheets("read boom".to_string()));
            }
            Ok(self.known.iter().cloned().collect())
        }

        async fn write_listings(
            &self,
            listings: &[PropertyListing],
            new_urls: &HashSet<String>,
        ) -> Result<(), CollaboratorError> {
            if self.fail_write {
                return Err(CollaboratorError::Sheets("write boom".to_string()));
            }
            let rows: Vec<String> = listings.iter().map(|l| l.url.clone()).collect();
            let mut flagged: Vec<String> = new_urls.iter().cloned().collect();
            flagged.sort();
            self.writes.lock().unwrap().push((rows, flagged));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        digests: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify_new_listings(
            &self,
            listings: &[PropertyListing],
        ) -> Result<(), CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError::Notify("mail boom".to_string()));
            }
            self.digests
                .lock()
                .unwrap()
                .push(listings.iter().map(|l| l.url.clone()).collect());
            Ok(())
        }
    }

    fn fast_settings() -> ScrapeSettings {
        ScrapeSettings {
            max_pages: 10,
            politeness_delay_ms: 0,
            retry_attempts: 2,
            retry_backoff_ms: 0,
            render_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn first_run_flags_and_notifies_everything() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/", "/chintai/b/", "/chintai/c/"])), Ok(empty_page())],
        };
        let sheet = RecordingSheet::default();
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.new_count, 3);
        assert!(report.persisted);
        assert!(report.notified);

        let writes = sheet.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let (rows, flagged) = &writes[0];
        assert_eq!(rows.len(), 3);
        assert_eq!(flagged.len(), 3, "every row flagged new on first run");

        let digests = notifier.digests.lock().unwrap();
        assert_eq!(digests.len(), 1);
        assert_eq!(digests[0].len(), 3);
    }

    #[tokio::test]
    async fn known_urls_suppress_notification() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/", "/chintai/b/"])), Ok(empty_page())],
        };
        let sheet = RecordingSheet {
            known: vec![
                "https://suumo.jp/chintai/a/".to_string(),
                "https://suumo.jp/chintai/b/".to_string(),
            ],
            ..Default::default()
        };
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert_eq!(report.new_count, 0);
        assert!(report.persisted, "full set still persisted");
        assert!(!report.notified);
        assert!(notifier.digests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_scrape_still_persists_and_notifies() {
        // Page 2 fails every attempt; page 1's listings must still flow
        // through persistence and notification
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/", "/chintai/b/"]))],
        };
        let sheet = RecordingSheet::default();
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert!(report.partial);
        assert_eq!(report.total, 2);
        assert!(report.persisted);
        assert!(report.notified);
    }

    #[tokio::test]
    async fn sheet_read_failure_ends_cycle_without_write() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/"])), Ok(empty_page())],
        };
        let sheet = RecordingSheet {
            fail_read: true,
            ..Default::default()
        };
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert!(!report.persisted);
        assert!(!report.notified);
        assert!(sheet.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sheet_write_failure_skips_notification() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/"])), Ok(empty_page())],
        };
        let sheet = RecordingSheet {
            fail_write: true,
            ..Default::default()
        };
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert!(!report.persisted);
        assert!(!report.notified);
        assert!(notifier.digests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_is_not_fatal() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(page_with_urls(&["/chintai/a/"])), Ok(empty_page())],
        };
        let sheet = RecordingSheet::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert!(report.persisted);
        assert!(!report.notified);
        assert_eq!(report.new_count, 1);
    }

    #[tokio::test]
    async fn empty_scrape_touches_no_collaborator() {
        let fetcher = FixtureFetcher {
            pages: vec![Ok(empty_page())],
        };
        let sheet = RecordingSheet::default();
        let notifier = RecordingNotifier::default();

        let report = run_cycle(&fetcher, &fast_settings(), &sheet, &notifier).await;

        assert_eq!(report.total, 0);
        assert!(!report.persisted);
        assert!(sheet.writes.lock().unwrap().is_empty());
    }
}
