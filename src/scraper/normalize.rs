//! Typed values and stable identity keys from raw card strings

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use url::Url;

use crate::models::{Component, Price, RawCard};

use super::extract::normalize_whitespace;

/// Sentinel for optional text fields nobody could resolve
pub const UNKNOWN: &str = "N/A";

const STOCK_PHRASES: [&str; 3] = ["in stock", "add to cart", "buy now"];

const KNOWN_BRANDS: &[&str] = &[
    "AMD",
    "Intel",
    "NVIDIA",
    "ASUS",
    "MSI",
    "Gigabyte",
    "ASRock",
    "Biostar",
    "Corsair",
    "G.Skill",
    "Kingston",
    "Crucial",
    "Samsung",
    "Western Digital",
    "Seagate",
    "Toshiba",
    "Transcend",
    "Adata",
    "Lexar",
    "PNY",
    "Team",
    "Zotac",
    "Sapphire",
    "PowerColor",
    "Palit",
    "Galax",
    "Colorful",
    "Cooler Master",
    "DeepCool",
    "Thermaltake",
    "Lian Li",
    "NZXT",
    "Antec",
    "be quiet!",
    "Noctua",
    "Arctic",
    "Seasonic",
    "Xigmatek",
    "Gamdias",
    "Thermalright",
];

/// Integer part of the first number in `text`, in the smallest currency unit
///
/// Thousands separators are skipped and a decimal fraction is dropped, so
/// `"TK 12,345.00"` is `12345`. Text without digits is `0`.
pub fn parse_price(text: &str) -> i64 {
    let mut digits = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if !digits.is_empty() && c != ',' {
            break;
        }
    }

    digits.parse().unwrap_or(0)
}

/// Stock badge or button text means available only if it carries a known phrase
pub fn is_in_stock(text: Option<&str>) -> bool {
    text.is_some_and(|text| {
        let lower = text.to_lowercase();
        STOCK_PHRASES.iter().any(|phrase| lower.contains(phrase))
    })
}

/// Canonical brand from explicit brand text, or from the product name
pub fn canonical_brand(explicit: Option<&str>, name: &str) -> String {
    if let Some(text) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        let lower = text.to_lowercase();
        let exact = KNOWN_BRANDS.iter().find(|brand| brand.to_lowercase() == lower);
        // longest containment wins, so "Gamdias" is not read as "AMD"
        let known = exact.or_else(|| {
            KNOWN_BRANDS
                .iter()
                .filter(|brand| lower.contains(&brand.to_lowercase()))
                .max_by_key(|brand| brand.len())
        });
        return known.map_or_else(|| text.to_string(), |brand| (*brand).to_string());
    }

    let lower = name.trim().to_lowercase();
    let known = KNOWN_BRANDS.iter().find(|brand| {
        lower
            .strip_prefix(&brand.to_lowercase())
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
    });

    match known {
        Some(brand) => (*brand).to_string(),
        None => name
            .split_whitespace()
            .next()
            .map_or_else(|| UNKNOWN.to_string(), str::to_string),
    }
}

/// Last non-empty path segment of a product URL, lower-cased, with
/// non-alphanumeric runs collapsed to `-`
///
/// Falls back to the URL's md5 digest when the path has nothing usable.
pub fn url_slug(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let segment = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or_default();

    let mut slug = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');

    if slug.is_empty() {
        format!("{:x}", md5::compute(url))
    } else {
        slug.to_string()
    }
}

/// Persisted component id for a product URL within a category
pub fn identity_key(category: &str, url: &str) -> String {
    format!("{category}-{}", url_slug(url))
}

/// Lower-cased, whitespace-collapsed label used as a specifications key
pub fn normalize_label(label: &str) -> String {
    normalize_whitespace(label)
        .trim_end_matches(':')
        .trim()
        .to_lowercase()
}

/// Split card spec fragments into label/value entries, dropping fragments
/// without a colon, and keep the joined fragment list as `summary`
pub fn parse_spec_fragments(fragments: &[String]) -> BTreeMap<String, String> {
    let mut specifications = BTreeMap::new();

    for fragment in fragments {
        if let Some((label, value)) = fragment.split_once(':') {
            let label = normalize_label(label);
            let value = normalize_whitespace(value);
            if !label.is_empty() && !value.is_empty() {
                specifications.insert(label, value);
            }
        }
    }

    if !fragments.is_empty() {
        specifications.insert("summary".to_string(), fragments.join(" | "));
    }

    specifications
}

/// Build the component and price rows for one listing card
pub fn build_records(
    card: &RawCard,
    category: &str,
    vendor_id: &str,
    now: DateTime<Utc>,
) -> (Component, Price) {
    let id = identity_key(category, &card.url);

    let component = Component {
        id: id.clone(),
        name: card.name.clone(),
        name_localized: card.name_localized.clone(),
        category: category.to_string(),
        brand: canonical_brand(card.brand_text.as_deref(), &card.name),
        socket: None,
        chipset: None,
        memory_type: None,
        form_factor: None,
        power_consumption_watts: None,
        specifications: parse_spec_fragments(&card.spec_texts),
        images: card.image_url.iter().cloned().collect(),
        last_updated: now,
    };

    let price = Price {
        component_id: id,
        vendor_id: vendor_id.to_string(),
        price: card.price_text.as_deref().map_or(0, parse_price),
        in_stock: is_in_stock(card.stock_text.as_deref()),
        source_url: card.url.clone(),
        last_updated: now,
    };

    (component, price)
}
