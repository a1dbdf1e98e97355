use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Raw field values pulled off one listing card, before any unit parsing.
/// Every field is optional at this stage; the normalizer decides what is
/// actually required.
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub url: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub access: Option<String>,
    pub age: Option<String>,
    pub rent: Option<String>,
    pub management_fee: Option<String>,
    pub deposit: Option<String>,
    pub key_money: Option<String>,
    pub layout: Option<String>,
    pub area: Option<String>,
    pub main_image_url: Option<String>,
    pub image_urls: Vec<String>,
}

/// Extract one raw listing per card found on a rendered results page.
///
/// An empty vec is the normal "no more results" signal, not an error. A card
/// whose detail URL cannot be located is still yielded (and warned about)
/// so the caller sees it in its diagnostics; the normalizer rejects it.
pub fn parse_listing_cards(html: &str, page: u32) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let card_selector = Selector::parse("div.cassetteitem").unwrap();

    let cards: Vec<_> = document.select(&card_selector).collect();
    debug!("Found {} listing cards on page {}", cards.len(), page);

    let mut listings = Vec::with_capacity(cards.len());
    for card in cards {
        let raw = parse_card(&card);
        if raw.url.is_none() {
            let snippet: String = card.text().collect::<String>();
            warn!(
                "Listing card on page {} has no detail url (text: {:.80})",
                page,
                snippet.split_whitespace().collect::<Vec<_>>().join(" ")
            );
        }
        listings.push(raw);
    }
    listings
}

fn parse_card(card: &ElementRef) -> RawListing {
    let link_selector = Selector::parse(".js-cassette_link_href").unwrap();
    let image_selector = Selector::parse(".cassetteitem_object-item img").unwrap();
    // The site misspells this class; keep it verbatim.
    let thumbs_selector = Selector::parse(".casssetteitem_other-thumbnail").unwrap();

    let url = card
        .select(&link_selector)
        .find_map(|a| a.value().attr("href"))
        .map(absolute_detail_url);

    let main_image_url = card
        .select(&image_selector)
        .find_map(|img| img.value().attr("src"))
        .map(str::to_string);

    let image_urls = card
        .select(&thumbs_selector)
        .find_map(|el| el.value().attr("data-imgs"))
        .map(|imgs| {
            imgs.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    RawListing {
        url,
        name: select_text(card, ".cassetteitem_content-title"),
        location: select_text(card, ".cassetteitem_detail-col1"),
        access: select_text(card, ".cassetteitem_detail-col2"),
        age: select_text(card, ".cassetteitem_detail-col3"),
        rent: select_text(card, ".cassetteitem_price--rent"),
        management_fee: select_text(card, ".cassetteitem_price--administration"),
        deposit: select_text(card, ".cassetteitem_price--deposit"),
        key_money: select_text(card, ".cassetteitem_price--gratuity"),
        layout: select_text(card, ".cassetteitem_madori"),
        area: select_text(card, ".cassetteitem_menseki"),
        main_image_url,
        image_urls,
    }
}

/// Trimmed text of the first element matching `selector`, `None` when the
/// card has no such element or only whitespace.
fn select_text(card: &ElementRef, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).unwrap();
    card.select(&sel).next().and_then(|el| {
        let text = el
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    })
}

/// Detail URLs come back relative and carry tracking query params.
fn absolute_detail_url(href: &str) -> String {
    let path = href.split('?').next().unwrap_or(href);
    if path.starts_with('/') {
        format!("https://suumo.jp{}", path)
    } else {
        path.to_string()
    }
}
