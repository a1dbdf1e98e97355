use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Building age as shown on a listing card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingAge {
    /// 新築 (new construction)
    New,
    /// 築N年
    Years(u32),
    /// Missing or unparsable
    Unknown,
}

impl BuildingAge {
    pub fn display(&self) -> String {
        match self {
            BuildingAge::New => "新築".to_string(),
            BuildingAge::Years(n) => format!("築{}年", n),
            BuildingAge::Unknown => String::new(),
        }
    }
}

/// One rental unit offering, keyed by its detail-page URL.
///
/// The URL is the primary key for change detection; everything else is
/// best-effort extraction and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyListing {
    pub url: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub access: Option<String>,
    pub building_age: BuildingAge,
    /// Monthly rent in yen
    pub rent: Option<u64>,
    /// Monthly management fee in yen
    pub management_fee: Option<u64>,
    /// Deposit (敷金) in yen
    pub deposit: Option<u64>,
    /// Key money (礼金) in yen
    pub key_money: Option<u64>,
    /// Room configuration code, e.g. "1LDK"
    pub layout: Option<String>,
    /// Floor area in square meters
    pub area_sqm: Option<f64>,
    pub main_image_url: Option<String>,
    pub image_urls: Vec<String>,
}

/// Spreadsheet column order. The persisted sheet layout depends on this
/// staying stable across versions.
pub const SHEET_COLUMNS: [&str; 13] = [
    "物件名",
    "所在地",
    "アクセス",
    "築年数",
    "賃料",
    "管理費",
    "敷金",
    "礼金",
    "間取り",
    "専有面積",
    "物件URL",
    "メイン画像",
    "画像一覧",
];

impl PropertyListing {
    /// One spreadsheet row in `SHEET_COLUMNS` order.
    pub fn to_sheet_row(&self) -> Vec<String> {
        let yen = |v: &Option<u64>| v.map(|n| n.to_string()).unwrap_or_default();
        vec![
            self.name.clone().unwrap_or_default(),
            self.location.clone().unwrap_or_default(),
            self.access.clone().unwrap_or_default(),
            self.building_age.display(),
            yen(&self.rent),
            yen(&self.management_fee),
            yen(&self.deposit),
            yen(&self.key_money),
            self.layout.clone().unwrap_or_default(),
            self.area_sqm.map(|a| format!("{}", a)).unwrap_or_default(),
            self.url.clone(),
            self.main_image_url.clone().unwrap_or_default(),
            self.image_urls.join(","),
        ]
    }
}

/// Everything one full scrape produced, in site-native result order.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    pub listings: Vec<PropertyListing>,
    /// True when the scan ended on exhausted fetch retries rather than a
    /// clean empty page or the page bound.
    pub partial: bool,
    pub pages_fetched: u32,
}

/// Listings present in the current scrape but not in the previously
/// persisted state.
#[derive(Debug, Clone)]
pub struct Delta {
    pub new_listings: Vec<PropertyListing>,
    pub known_urls: HashSet<String>,
}
