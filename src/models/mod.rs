//! Data models for scraped listings and persisted component/price rows

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A category listing to refresh, static for the whole run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryTarget {
    pub category_id: String,
    pub listing_url: String,
}

impl CategoryTarget {
    pub fn new(category_id: &str, listing_url: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            listing_url: listing_url.to_string(),
        }
    }
}

/// Raw values resolved from one product card on a listing page
///
/// Only lives for the processing of a single listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCard {
    pub name: String,
    pub url: String,
    pub price_text: Option<String>,
    pub stock_text: Option<String>,
    pub brand_text: Option<String>,
    pub image_url: Option<String>,
    pub name_localized: Option<String>,
    pub spec_texts: Vec<String>,
}

/// One listing page after extraction
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// 1-based page index
    pub index: u32,
    /// Number of product containers found, including discarded ones
    pub container_count: usize,
    pub cards: Vec<RawCard>,
}

/// A PC component as persisted in `components`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    /// `category-slug`, stable across runs for the same product URL
    pub id: String,
    pub name: String,
    pub name_localized: Option<String>,
    pub category: String,
    pub brand: String,
    pub socket: Option<String>,
    pub chipset: Option<String>,
    pub memory_type: Option<String>,
    pub form_factor: Option<String>,
    pub power_consumption_watts: Option<i32>,
    /// Attributes without a dedicated column, keyed by normalized label
    pub specifications: BTreeMap<String, String>,
    pub images: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Component {
    /// Merge detail-page attributes; detail values win over listing values
    pub fn apply_details(&mut self, details: DetailAttributes) {
        let DetailAttributes {
            socket,
            chipset,
            memory_type,
            form_factor,
            power_consumption_watts,
            specifications,
        } = details;

        if socket.is_some() {
            self.socket = socket;
        }
        if chipset.is_some() {
            self.chipset = chipset;
        }
        if memory_type.is_some() {
            self.memory_type = memory_type;
        }
        if form_factor.is_some() {
            self.form_factor = form_factor;
        }
        if power_consumption_watts.is_some() {
            self.power_consumption_watts = power_consumption_watts;
        }
        self.specifications.extend(specifications);
    }
}

/// A vendor's offer for a component, one row per (component, vendor)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Price {
    pub component_id: String,
    pub vendor_id: String,
    /// Smallest currency unit
    pub price: i64,
    pub in_stock: bool,
    pub source_url: String,
    pub last_updated: DateTime<Utc>,
}

/// Static vendor reference row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub id: String,
    pub name: String,
}

/// Attributes recovered from a product's own page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailAttributes {
    pub socket: Option<String>,
    pub chipset: Option<String>,
    pub memory_type: Option<String>,
    pub form_factor: Option<String>,
    pub power_consumption_watts: Option<i32>,
    pub specifications: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_override_listing_values_but_keep_unknowns() {
        let mut component = Component {
            id: "processor-amd-ryzen-5".to_string(),
            name: "AMD Ryzen 5".to_string(),
            name_localized: None,
            category: "processor".to_string(),
            brand: "AMD".to_string(),
            socket: Some("AM4".to_string()),
            chipset: None,
            memory_type: None,
            form_factor: None,
            power_consumption_watts: None,
            specifications: BTreeMap::from([
                ("speed".to_string(), "3.5GHz".to_string()),
                ("cache".to_string(), "16MB".to_string()),
            ]),
            images: Vec::new(),
            last_updated: Utc::now(),
        };

        component.apply_details(DetailAttributes {
            socket: None,
            memory_type: Some("DDR4".to_string()),
            power_consumption_watts: Some(65),
            specifications: BTreeMap::from([("speed".to_string(), "3.7GHz".to_string())]),
            ..DetailAttributes::default()
        });

        assert_eq!(component.socket.as_deref(), Some("AM4"));
        assert_eq!(component.memory_type.as_deref(), Some("DDR4"));
        assert_eq!(component.power_consumption_watts, Some(65));
        assert_eq!(component.specifications["speed"], "3.7GHz");
        assert_eq!(component.specifications["cache"], "16MB");
    }
}
