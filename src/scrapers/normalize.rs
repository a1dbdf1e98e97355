use regex::Regex;
use tracing::warn;

use crate::error::NormalizationError;
use crate::models::{BuildingAge, PropertyListing};
use crate::scrapers::parser::RawListing;

/// Turn one raw card into a typed record.
///
/// Only the detail URL is required. Every numeric field degrades to absent
/// when its text cannot be parsed; the degraded value is logged with the raw
/// snippet so site-markup drift shows up in the logs.
pub fn normalize(raw: RawListing, page: u32) -> Result<PropertyListing, NormalizationError> {
    let url = match raw.url {
        Some(u) if !u.is_empty() => u,
        _ => return Err(NormalizationError::MissingUrl { page }),
    };

    Ok(PropertyListing {
        rent: parse_money_field(raw.rent.as_deref(), "rent", &url, page),
        management_fee: parse_money_field(raw.management_fee.as_deref(), "management_fee", &url, page),
        deposit: parse_money_field(raw.deposit.as_deref(), "deposit", &url, page),
        key_money: parse_money_field(raw.key_money.as_deref(), "key_money", &url, page),
        building_age: raw.age.as_deref().map(parse_age).unwrap_or(BuildingAge::Unknown),
        area_sqm: parse_area_field(raw.area.as_deref(), &url, page),
        url,
        name: raw.name,
        location: raw.location,
        access: raw.access,
        layout: raw.layout,
        main_image_url: raw.main_image_url,
        image_urls: raw.image_urls,
    })
}

fn parse_money_field(text: Option<&str>, field: &str, url: &str, page: u32) -> Option<u64> {
    let text = text?;
    match parse_money(text) {
        Money::Amount(yen) => Some(yen),
        Money::None => None,
        Money::Unparsable => {
            warn!(
                "Unparsable {} {:?} on page {} ({}), treating as absent",
                field, text, page, url
            );
            None
        }
    }
}

fn parse_area_field(text: Option<&str>, url: &str, page: u32) -> Option<f64> {
    let text = text?;
    let parsed = parse_area(text);
    if parsed.is_none() {
        warn!(
            "Unparsable area {:?} on page {} ({}), treating as absent",
            text, page, url
        );
    }
    parsed
}

enum Money {
    Amount(u64),
    /// Explicit "no charge" marker, distinct from a parse failure
    None,
    Unparsable,
}

/// Parse a listing-card money string into yen.
///
/// Accepted forms: "8.5万円" (ten-thousands), "5000円", plain digits with
/// comma grouping, full-width digits. "-", "なし" and empty mean no charge.
fn parse_money(text: &str) -> Money {
    let text = fold_fullwidth(text);
    let text = text.trim();

    if text.is_empty() || text == "-" || text == "－" || text == "なし" {
        return Money::None;
    }

    let cleaned = text.replace(',', "");

    let man_re = Regex::new(r"([\d.]+)\s*万").unwrap();
    if let Some(caps) = man_re.captures(&cleaned) {
        if let Ok(man) = caps[1].parse::<f64>() {
            return Money::Amount((man * 10_000.0).round() as u64);
        }
        return Money::Unparsable;
    }

    let yen_re = Regex::new(r"(\d+)\s*円?").unwrap();
    if let Some(caps) = yen_re.captures(&cleaned) {
        if let Ok(yen) = caps[1].parse::<u64>() {
            return Money::Amount(yen);
        }
    }

    Money::Unparsable
}

/// Parse a floor area like "25.5m²", "25.5m2" or "２５．５㎡".
fn parse_area(text: &str) -> Option<f64> {
    let text = fold_fullwidth(text);
    let area_re = Regex::new(r"([\d.]+)").unwrap();
    let caps = area_re.captures(&text)?;
    caps[1].parse::<f64>().ok()
}

/// Parse a building age like "築12年" or the "新築" sentinel.
fn parse_age(text: &str) -> BuildingAge {
    let text = fold_fullwidth(text);
    let text = text.trim();

    if text.contains("新築") {
        return BuildingAge::New;
    }

    let age_re = Regex::new(r"築\s*(\d+)\s*年").unwrap();
    if let Some(caps) = age_re.captures(text) {
        if let Ok(years) = caps[1].parse::<u32>() {
            return BuildingAge::Years(years);
        }
    }

    BuildingAge::Unknown
}

/// Fold full-width digits and punctuation into their ASCII forms so one set
/// of regexes covers both renderings.
fn fold_fullwidth(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '．' => '.',
            '，' => ',',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_url() -> RawListing {
        RawListing {
            url: Some("https://suumo.jp/chintai/jnc_000012345/".to_string()),
            name: Some("グランメゾン三軒茶屋".to_string()),
            location: Some("東京都世田谷区太子堂".to_string()),
            access: Some("東急田園都市線/三軒茶屋駅 歩5分".to_string()),
            age: Some("築12年".to_string()),
            rent: Some("8.5万円".to_string()),
            management_fee: Some("5000円".to_string()),
            deposit: Some("-".to_string()),
            key_money: Some("8.5万円".to_string()),
            layout: Some("1K".to_string()),
            area: Some("25.5m2".to_string()),
            main_image_url: None,
            image_urls: vec![],
        }
    }

    #[test]
    fn well_formed_raw_listing_normalizes() {
        let listing = normalize(raw_with_url(), 1).unwrap();
        assert_eq!(listing.rent, Some(85_000));
        assert_eq!(listing.management_fee, Some(5_000));
        assert_eq!(listing.deposit, None, "explicit dash means no deposit");
        assert_eq!(listing.key_money, Some(85_000));
        assert_eq!(listing.building_age, BuildingAge::Years(12));
        assert_eq!(listing.area_sqm, Some(25.5));
        assert_eq!(listing.layout.as_deref(), Some("1K"));
    }

    #[test]
    fn missing_url_is_the_only_hard_failure() {
        let mut raw = raw_with_url();
        raw.url = None;
        assert!(matches!(
            normalize(raw, 2),
            Err(NormalizationError::MissingUrl { page: 2 })
        ));

        let mut raw = raw_with_url();
        raw.url = Some(String::new());
        assert!(normalize(raw, 2).is_err());
    }

    #[test]
    fn every_other_field_may_be_absent() {
        let raw = RawListing {
            url: Some("https://suumo.jp/chintai/jnc_000099999/".to_string()),
            ..Default::default()
        };
        let listing = normalize(raw, 1).unwrap();
        assert!(listing.name.is_none());
        assert!(listing.rent.is_none());
        assert_eq!(listing.building_age, BuildingAge::Unknown);
        assert!(listing.area_sqm.is_none());
    }

    #[test]
    fn unparsable_numbers_degrade_to_absent() {
        let mut raw = raw_with_url();
        raw.rent = Some("要問合せ".to_string());
        raw.area = Some("広め".to_string());
        let listing = normalize(raw, 1).unwrap();
        assert!(listing.rent.is_none());
        assert!(listing.area_sqm.is_none());
    }

    #[test]
    fn money_parsing_covers_site_formats() {
        assert!(matches!(parse_money("8.5万円"), Money::Amount(85_000)));
        assert!(matches!(parse_money("12万円"), Money::Amount(120_000)));
        assert!(matches!(parse_money("5000円"), Money::Amount(5_000)));
        assert!(matches!(parse_money("1,000円"), Money::Amount(1_000)));
        assert!(matches!(parse_money("８．５万円"), Money::Amount(85_000)));
        assert!(matches!(parse_money("-"), Money::None));
        assert!(matches!(parse_money("なし"), Money::None));
        assert!(matches!(parse_money(""), Money::None));
        assert!(matches!(parse_money("要問合せ"), Money::Unparsable));
    }

    #[test]
    fn age_parsing_covers_site_formats() {
        assert_eq!(parse_age("新築"), BuildingAge::New);
        assert_eq!(parse_age("築5年"), BuildingAge::Years(5));
        assert_eq!(parse_age("築１２年"), BuildingAge::Years(12));
        assert_eq!(parse_age("築年数不明"), BuildingAge::Unknown);
    }

    #[test]
    fn area_parsing_handles_fullwidth_and_units() {
        assert_eq!(parse_area("25.5m2"), Some(25.5));
        assert_eq!(parse_area("25.5m²"), Some(25.5));
        assert_eq!(parse_area("２５．５㎡"), Some(25.5));
        assert_eq!(parse_area("広め"), None);
    }
}
