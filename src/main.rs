mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod scheduler;
mod scrapers;
mod sheets;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{MailSettings, ScrapeSettings, SearchParams, SheetsSettings};
use notify::DigestMailer;
use pipeline::run_cycle;
use scrapers::browser::BASE_URL;
use scrapers::{BrowserSession, RenderedPageFetcher};
use sheets::GoogleSheetsStore;

/// Rental-listing watcher: scrape the search results, diff against the last
/// run, persist to a spreadsheet and mail a digest of new listings.
#[derive(Parser)]
#[command(name = "rental-scout")]
struct Args {
    /// JSON file with the search-filter parameters
    #[arg(long, default_value = "params.json")]
    params: PathBuf,

    /// Run twice daily (06:00 and 18:00) instead of once
    #[arg(long)]
    schedule: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.schedule {
        scheduler::run_scheduled(|| run_once(&args.params)).await;
        unreachable!("scheduled mode never returns");
    }

    run_once(&args.params).await
}

/// One full cycle with a browser session scoped to it: the session is
/// released on exit whether the cycle succeeded or not.
async fn run_once(params_path: &Path) -> Result<()> {
    let params = SearchParams::load(params_path)?;
    let settings = ScrapeSettings::default();
    let sheets_settings = SheetsSettings::from_env()?;
    let mail_settings = MailSettings::from_env()?;

    let search_url = format!("{}?{}", BASE_URL, params.to_query());
    info!("Search url: {}", search_url);

    let sheet = GoogleSheetsStore::new(sheets_settings, search_url)?;
    let mailer = DigestMailer::new(mail_settings, sheet.spreadsheet_url())?;

    let session = BrowserSession::launch()?;
    let fetcher = RenderedPageFetcher::new(&session, &params, &settings);

    let report = run_cycle(&fetcher, &settings, &sheet, &mailer).await;

    info!(
        "Cycle complete: {} listings, {} new, persisted={}, notified={}{}",
        report.total,
        report.new_count,
        report.persisted,
        report.notified,
        if report.partial { " (partial scrape)" } else { "" }
    );

    Ok(())
}
