use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Opaque search-filter parameters (location codes, price range, layout,
/// ...) appended verbatim to the results URL. The pipeline never interprets
/// them beyond requiring the set to be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams(pub BTreeMap<String, String>);

impl SearchParams {
    /// Load the parameter map from a JSON file (`params.json` style:
    /// a flat string-to-string object).
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search params: {}", path.display()))?;
        let map: BTreeMap<String, String> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        if map.is_empty() {
            bail!("search params file {} is empty", path.display());
        }
        Ok(Self(map))
    }

    /// Query-string fragment for these params, skipping blank values.
    pub fn to_query(&self) -> String {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Pagination and politeness tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSettings {
    /// Hard backstop against a site that never yields an empty page
    pub max_pages: u32,
    /// Pause between consecutive page fetches
    pub politeness_delay_ms: u64,
    /// Attempts per page before the run degrades to partial
    pub retry_attempts: u32,
    /// Pause between retry attempts for one page
    pub retry_backoff_ms: u64,
    /// How long to wait for listing cards to render
    pub render_timeout_secs: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_pages: 50,
            politeness_delay_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: 10_000,
            render_timeout_secs: 30,
        }
    }
}

/// Google Sheets adapter settings, taken from the environment
#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub access_token: String,
}

impl SheetsSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            spreadsheet_id: require_env("SPREADSHEET_ID")?,
            access_token: require_env("SHEETS_ACCESS_TOKEN")?,
        })
    }
}

/// Mail adapter settings, taken from the environment
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub recipient: String,
}

impl MailSettings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env("MAIL_API_KEY")?,
            sender_email: require_env("MAIL_SENDER")?,
            sender_name: std::env::var("MAIL_SENDER_NAME")
                .unwrap_or_else(|_| "rental-scout".to_string()),
            recipient: require_env("NOTIFICATION_EMAIL")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Environment variable {} is not set", key))
}
