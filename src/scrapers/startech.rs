//! StarTech (startech.com.bd) selector preset

use crate::error::FinderError;
use crate::models::CategoryTarget;
use crate::traits::{Locator, RetailerConfig, SelectorSpec};

pub const VENDOR_ID: &str = "startech";

const CATEGORIES: &[(&str, &str)] = &[
    ("processor", "https://www.startech.com.bd/component/processor"),
    ("cpu_cooler", "https://www.startech.com.bd/component/CPU-Cooler"),
    ("motherboard", "https://www.startech.com.bd/component/motherboard"),
    ("graphics_card", "https://www.startech.com.bd/component/graphics-card"),
    ("ram", "https://www.startech.com.bd/component/ram"),
    ("power_supply", "https://www.startech.com.bd/component/power-supply"),
    ("hard_disk_drive", "https://www.startech.com.bd/component/hard-disk-drive"),
    ("ssd", "https://www.startech.com.bd/ssd"),
    ("casing", "https://www.startech.com.bd/component/casing"),
    ("casing_cooler", "https://www.startech.com.bd/component/casing-cooler"),
];

/// StarTech retailer configuration with all component categories
pub fn retailer() -> Result<RetailerConfig, FinderError> {
    let selectors = SelectorSpec {
        container: Locator::parse_all("container", &["div.p-item"])?,
        name: Locator::parse_all("name", &["h4.p-item-name a", "h4.p-item-name"])?,
        url: Locator::parse_all("url", &["h4.p-item-name a@href", "div.p-item-img a@href"])?,
        price: Locator::parse_all(
            "price",
            &["div.p-item-price span.price-new", "div.p-item-price span"],
        )?,
        stock: Locator::parse_all("stock", &["div.p-item-stock span"])?,
        brand: Locator::parse_all("brand", &["div.p-item-brand img@alt"])?,
        // lazy-loaded thumbnails keep the real URL in data-src
        image: Locator::parse_all("image", &["div.p-item-img img@data-src", "div.p-item-img img@src"])?,
        spec_list: Locator::parse_all("spec_list", &["div.p-item-details ul li"])?,
        name_localized: Vec::new(),
        pagination: Locator::parse_all("pagination", &["ul.pagination li a", "ul.pagination li span"])?,
    };

    Ok(RetailerConfig {
        vendor_id: VENDOR_ID.to_string(),
        name: "StarTech".to_string(),
        categories: CATEGORIES
            .iter()
            .map(|(category, url)| CategoryTarget::new(category, url))
            .collect(),
        selectors,
        page_url_pattern: "{url}?page={page}".to_string(),
        enrich_details: true,
    })
}
