use std::collections::HashSet;

use crate::models::{Delta, PropertyListing};

/// Listings in `current` whose url is not in `known_urls`, in their original
/// relative order.
///
/// Equality is url-only: a listing whose url recurs with changed fields
/// (a lowered rent, say) is not reported as new. That mirrors how the sheet
/// itself keys rows and is a deliberate choice, not an oversight.
pub fn detect(current: &[PropertyListing], known_urls: HashSet<String>) -> Delta {
    let new_listings = current
        .iter()
        .filter(|listing| !known_urls.contains(&listing.url))
        .cloned()
        .collect();

    Delta {
        new_listings,
        known_urls,
    }
}
