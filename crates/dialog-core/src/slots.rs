//! Slot Parsers: pure, deterministic, language-agnostic string→typed-value
//! mappings used to interpret a user's direct answer to the question the
//! dialog manager just asked (§4.3). Ported from
//! `original_source/shop_agent/orchestrator.py`'s `_parse_days`,
//! `_parse_opened`, `_parse_price`, `_parse_category`, and friends.
//!
//! Parsers never throw; on failure they return `None` and the slot stays
//! unfilled.

use regex::Regex;
use std::sync::LazyLock;

use crate::session::PickupAddress;

static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d{1,2})?").unwrap());
static PRODUCT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{10}\b").unwrap());
static PRODUCT_URL_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|gp/product|product)/([A-Za-z0-9]{6,})").unwrap());

/// First integer in the message, e.g. for `days_since_purchase`.
pub fn parse_days_since_purchase(message: &str) -> Option<i64> {
    INT_RE.find(message)?.as_str().parse().ok()
}

/// Tri-state yes/no parser shared by `item_opened`,
/// `furniture_assembled`-style synonyms, and similar yes/no slots.
fn parse_yes_no(message: &str, no_words: &[&str], yes_words: &[&str]) -> Option<bool> {
    let lower = message.to_lowercase();
    if no_words.iter().any(|w| lower.contains(w)) {
        return Some(false);
    }
    if yes_words.iter().any(|w| lower.contains(w)) {
        return Some(true);
    }
    None
}

/// `item_opened`: `unopened`/`sealed`/`not opened`/`no` → false;
/// `opened`/`yes` → true.
pub fn parse_item_opened(message: &str) -> Option<bool> {
    parse_yes_no(
        message,
        &["unopened", "sealed", "not opened", "no"],
        &["opened", "yes"],
    )
}

/// `furniture_assembled`: `assembled` → true; `not assembled`/`unassembled`
/// → false, plus generic yes/no synonyms.
pub fn parse_furniture_assembled(message: &str) -> Option<bool> {
    let lower = message.to_lowercase();
    if lower.contains("not assembled") || lower.contains("unassembled") || lower.contains("no") {
        return Some(false);
    }
    if lower.contains("assembled") || lower.contains("yes") {
        return Some(true);
    }
    None
}

/// `electronics_defect_claimed`: `defective`/`broken`/`doesn't work` → true;
/// `changed my mind`/`don't like` → false.
pub fn parse_electronics_defect_claimed(message: &str) -> Option<bool> {
    let lower = message.to_lowercase();
    if lower.contains("defective") || lower.contains("broken") || lower.contains("doesn't work")
    {
        return Some(true);
    }
    if lower.contains("changed my mind") || lower.contains("don't like") {
        return Some(false);
    }
    None
}

/// `intent` keyword match: `broken`/`defective` → arrived-broken (modeled
/// here as `replacement`), `refund` → want-refund, `not like`/`changed
/// mind` → did-not-like (modeled as `return`).
pub fn parse_intent(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("broken") || lower.contains("defective") {
        Some("replacement")
    } else if lower.contains("discount") || lower.contains("coupon") {
        Some("discount")
    } else if lower.contains("refund") {
        Some("refund")
    } else if lower.contains("not like") || lower.contains("changed mind")
        || lower.contains("changed my mind")
    {
        Some("return")
    } else {
        None
    }
}

/// `category` keyword match per category, e.g. `laptop`/`phone` →
/// Electronics. Returns a category key valid for the shipped default
/// policy table; a deployer loading a different table should supply its
/// own keyword map alongside it.
pub fn parse_category(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    let candidates: &[(&[&str], &str)] = &[
        (&["headphone", "earbud", "earphones", "in-ear"], "Headphones & Audio"),
        (&["phone", "smartphone", "iphone", "android"], "Phones"),
        (&["laptop", "tablet", "electronics", "tv", "television", "monitor"], "Electronics"),
        (&["furniture", "sofa", "couch", "table", "chair", "desk"], "Furniture"),
        (&["food", "grocery", "snack", "produce"], "Food"),
        (&["art", "painting", "sculpture", "print"], "Art"),
    ];
    candidates
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, category)| *category)
}

/// `customer_phone`: strip non-digits; accept if at least 10 digits remain.
pub fn parse_customer_phone(message: &str) -> Option<String> {
    let digits: String = message.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 10 {
        Some(digits)
    } else {
        None
    }
}

/// `pickup_address`: comma-split; accept if at least 3 parts. Stores both
/// the raw reply and the parsed parts (house, street, apt, city) per the
/// slot parser table.
pub fn parse_pickup_address(message: &str) -> Option<PickupAddress> {
    let parts: Vec<&str> = message.split(',').map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    if parts.len() < 3 {
        return None;
    }
    Some(PickupAddress {
        raw: message.to_string(),
        house: parts.first().map(|s| s.to_string()),
        street: parts.get(1).map(|s| s.to_string()),
        city: parts.last().map(|s| s.to_string()),
        apt: if parts.len() >= 4 {
            parts.get(2).map(|s| s.to_string())
        } else {
            None
        },
    })
}

/// `customer_name`: accept if at least 2 whitespace-separated tokens.
pub fn parse_customer_name(message: &str) -> Option<String> {
    let tokens: Vec<&str> = message.split_whitespace().collect();
    if tokens.len() >= 2 {
        Some(message.trim().to_string())
    } else {
        None
    }
}

/// `purchase_price`: first decimal number (1-2 decimal places optional),
/// with commas stripped first.
pub fn parse_purchase_price(message: &str) -> Option<f64> {
    let stripped = message.replace(',', "");
    PRICE_RE.find(&stripped)?.as_str().parse().ok()
}

/// `product_id`: a 10-character uppercase alphanumeric token, or the last
/// path segment of a known product URL shape (`/dp/`, `/gp/product/`,
/// `/product/`).
pub fn parse_product_id(message: &str) -> Option<String> {
    if let Some(m) = PRODUCT_ID_RE.find(message) {
        return Some(m.as_str().to_string());
    }
    PRODUCT_URL_PATH_RE
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn days_parses_first_integer() {
        assert_eq!(parse_days_since_purchase("about 4 days ago"), Some(4));
        assert_eq!(parse_days_since_purchase("no numbers here"), None);
    }

    #[test]
    fn item_opened_maps_synonyms() {
        assert_eq!(parse_item_opened("it's unopened"), Some(false));
        assert_eq!(parse_item_opened("still sealed"), Some(false));
        assert_eq!(parse_item_opened("yes I opened it"), Some(true));
        assert_eq!(parse_item_opened("blue"), None);
    }

    #[test]
    fn furniture_assembled_maps_synonyms() {
        assert_eq!(parse_furniture_assembled("not assembled yet"), Some(false));
        assert_eq!(parse_furniture_assembled("fully assembled"), Some(true));
    }

    #[test]
    fn category_matches_keyword() {
        assert_eq!(parse_category("my new phone broke"), Some("Phones"));
        assert_eq!(parse_category("the sofa arrived damaged"), Some("Furniture"));
    }

    #[test]
    fn phone_parser_requires_ten_digits() {
        assert_eq!(parse_customer_phone("call me at 555-123-4567"), Some("5551234567".into()));
        assert_eq!(parse_customer_phone("555-1234"), None);
    }

    #[test]
    fn address_requires_three_parts() {
        let addr = parse_pickup_address("12 Elm St, Apt 4, Springfield").unwrap();
        assert_eq!(addr.raw, "12 Elm St, Apt 4, Springfield");
        assert!(parse_pickup_address("just one thing").is_none());
    }

    #[test]
    fn price_strips_commas() {
        assert_eq!(parse_purchase_price("it cost $1,299.99"), Some(1299.99));
    }

    #[test]
    fn product_id_from_url_path() {
        assert_eq!(
            parse_product_id("https://example.com/dp/B08N5WRWNW/ref=foo"),
            Some("B08N5WRWNW".to_string())
        );
    }
}
