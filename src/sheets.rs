use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, Timelike};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::SheetsSettings;
use crate::error::CollaboratorError;
use crate::models::{PropertyListing, SHEET_COLUMNS};
use crate::pipeline::SheetStore;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Column header that carries the primary key, used to rehydrate known urls
/// from the previous snapshot.
const URL_COLUMN: &str = "物件URL";

/// Rows 1-3 of a snapshot are the search-url banner, a spacer and the
/// header; data starts on row 4.
const DATA_START_ROW: usize = 4;

/// Google Sheets persistence. Each run writes a dated snapshot sheet
/// (`YYYY/MM/DD/AM` or `/PM`) into the operator's spreadsheet and highlights
/// newly observed rows; known urls come from the previous snapshot, so any
/// out-of-band edits the operator makes elsewhere in the spreadsheet are
/// never touched.
pub struct GoogleSheetsStore {
    client: reqwest::Client,
    settings: SheetsSettings,
    search_url: String,
}

impl GoogleSheetsStore {
    pub fn new(settings: SheetsSettings, search_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            settings,
            search_url,
        })
    }

    pub fn spreadsheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}",
            self.settings.spreadsheet_id
        )
    }

    async fn create_snapshot_sheet(&self, title: &str) -> Result<i64, CollaboratorError> {
        let body = json!({
            "requests": [{
                "addSheet": { "properties": { "title": title } }
            }]
        });

        let resp = self
            .client
            .post(format!(
                "{}/{}:batchUpdate",
                API_BASE, self.settings.spreadsheet_id
            ))
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Sheets(format!(
                "addSheet returned {}: {}",
                status, detail
            )));
        }

        let reply: Value = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;
        reply["replies"][0]["addSheet"]["properties"]["sheetId"]
            .as_i64()
            .ok_or_else(|| {
                CollaboratorError::Sheets("addSheet reply carried no sheetId".to_string())
            })
    }

    async fn write_values(
        &self,
        title: &str,
        listings: &[PropertyListing],
    ) -> Result<(), CollaboratorError> {
        let body = json!({ "values": snapshot_values(&self.search_url, listings) });
        let range = urlencoding::encode(&format!("{}!A1", title)).into_owned();

        let resp = self
            .client
            .put(format!(
                "{}/{}/values/{}?valueInputOption=RAW",
                API_BASE, self.settings.spreadsheet_id, range
            ))
            .bearer_auth(&self.settings.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Sheets(format!(
                "values update returned {}: {}",
                status, detail
            )));
        }
        Ok(())
    }

    async fn highlight_rows(
        &self,
        sheet_id: i64,
        rows: &[usize],
    ) -> Result<(), CollaboratorError> {
        if rows.is_empty() {
            return Ok(());
        }

        let requests: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startRowIndex": row - 1,
                            "endRowIndex": row,
                            "startColumnIndex": 0,
                            "endColumnIndex": SHEET_COLUMNS.len()
                        },
                        "cell": {
                            "userEnteredFormat": {
                                "backgroundColor": {
                                    "red": 1.0, "green": 1.0, "blue": 0.0, "alpha": 0.5
                                }
                            }
                        },
                        "fields": "userEnteredFormat.backgroundColor"
                    }
                })
            })
            .collect();

        let resp = self
            .client
            .post(format!(
                "{}/{}:batchUpdate",
                API_BASE, self.settings.spreadsheet_id
            ))
            .bearer_auth(&self.settings.access_token)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(CollaboratorError::Sheets(format!(
                "highlight batchUpdate returned {}: {}",
                status, detail
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsStore {
    async fn read_known_urls(&self) -> Result<HashSet<String>, CollaboratorError> {
        let title = previous_snapshot_title(Local::now());
        info!("Reading known urls from snapshot {}", title);

        let range = urlencoding::encode(&format!("{}!A:Z", title)).into_owned();
        let resp = self
            .client
            .get(format!(
                "{}/{}/values/{}",
                API_BASE, self.settings.spreadsheet_id, range
            ))
            .bearer_auth(&self.settings.access_token)
            .send()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;

        // A missing snapshot is the first-run case, not a failure: every
        // current listing counts as new.
        if !resp.status().is_success() {
            warn!(
                "Previous snapshot {} not readable ({}), treating all listings as new",
                title,
                resp.status()
            );
            return Ok(HashSet::new());
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| CollaboratorError::Sheets(e.to_string()))?;
        Ok(known_urls_from_values(&body))
    }

    async fn write_listings(
        &self,
        listings: &[PropertyListing],
        new_urls: &HashSet<String>,
    ) -> Result<(), CollaboratorError> {
        let title = snapshot_title(Local::now());
        let sheet_id = self.create_snapshot_sheet(&title).await?;
        self.write_values(&title, listings).await?;

        let rows = new_row_numbers(listings, new_urls);
        let flagged = rows.len();
        self.highlight_rows(sheet_id, &rows).await?;

        info!(
            "Wrote {} rows to snapshot {} ({} highlighted as new)",
            listings.len(),
            title,
            flagged
        );
        Ok(())
    }
}

/// Snapshot title for a run at `now`: `YYYY/MM/DD/AM` before noon, `/PM`
/// after.
pub fn snapshot_title(now: DateTime<Local>) -> String {
    let half = if now.hour() < 12 { "AM" } else { "PM" };
    format!("{}/{}", now.format("%Y/%m/%d"), half)
}

/// Title of the snapshot the previous run wrote: the morning run diffs
/// against yesterday evening, the evening run against the same morning.
pub fn previous_snapshot_title(now: DateTime<Local>) -> String {
    if now.hour() < 12 {
        let yesterday = now - ChronoDuration::days(1);
        format!("{}/PM", yesterday.format("%Y/%m/%d"))
    } else {
        format!("{}/AM", now.format("%Y/%m/%d"))
    }
}

/// Cell grid for one snapshot: search-url banner, spacer, header row, then
/// one row per listing in scrape order.
fn snapshot_values(search_url: &str, listings: &[PropertyListing]) -> Vec<Vec<String>> {
    let mut values = Vec::with_capacity(listings.len() + 3);
    values.push(vec![format!("スクレイピングURL: {}", search_url)]);
    values.push(vec![]);
    values.push(SHEET_COLUMNS.iter().map(|c| c.to_string()).collect());
    values.extend(listings.iter().map(|l| l.to_sheet_row()));
    values
}

/// 1-based sheet row numbers of listings whose url is in `new_urls`.
fn new_row_numbers(listings: &[PropertyListing], new_urls: &HashSet<String>) -> Vec<usize> {
    listings
        .iter()
        .enumerate()
        .filter(|(_, l)| new_urls.contains(&l.url))
        .map(|(i, _)| i + DATA_START_ROW)
        .collect()
}

/// Pull the url column out of a previous snapshot's value grid.
fn known_urls_from_values(body: &Value) -> HashSet<String> {
    let Some(rows) = body["values"].as_array() else {
        return HashSet::new();
    };
    // Header row is the third row of the snapshot layout
    let Some(header) = rows.get(2).and_then(|r| r.as_array()) else {
        return HashSet::new();
    };
    let Some(url_col) = header
        .iter()
        .position(|cell| cell.as_str() == Some(URL_COLUMN))
    else {
        warn!("Previous snapshot has no {} column", URL_COLUMN);
        return HashSet::new();
    };

    rows.iter()
        .skip(3)
        .filter_map(|row| row.as_array())
        .filter_map(|row| row.get(url_col))
        .filter_map(|cell| cell.as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}
