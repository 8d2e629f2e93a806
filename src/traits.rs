//! Retailer-agnostic configuration and the fetch seam of the engine

use anyhow::Result;
use async_trait::async_trait;
use scraper::Selector;
use serde::Deserialize;

use crate::error::FinderError;
use crate::models::CategoryTarget;

/// Configuration for one retailer: where its listings live and how to read them
#[derive(Debug, Clone, Deserialize)]
pub struct RetailerConfig {
    /// Vendor identifier written into every price row
    pub vendor_id: String,
    /// Display name for logs
    pub name: String,
    /// Categories to refresh, in order
    pub categories: Vec<CategoryTarget>,
    /// Ordered locators for every extracted field
    pub selectors: SelectorSpec,
    /// Listing page URL pattern with `{url}` and `{page}` placeholders
    #[serde(default = "default_page_url_pattern")]
    pub page_url_pattern: String,
    /// Whether to visit each product page for socket/chipset/power data
    #[serde(default = "default_enrich_details")]
    pub enrich_details: bool,
}

fn default_page_url_pattern() -> String {
    "{url}?page={page}".to_string()
}

const fn default_enrich_details() -> bool {
    true
}

impl RetailerConfig {
    /// Build the URL of listing page `page` (1-based) for a category
    ///
    /// A listing URL that already carries a query string gets `&` instead of `?`.
    pub fn build_page_url(&self, listing_url: &str, page: u32) -> String {
        let pattern = if listing_url.contains('?') {
            self.page_url_pattern.replacen("{url}?", "{url}&", 1)
        } else {
            self.page_url_pattern.clone()
        };

        pattern
            .replace("{url}", listing_url)
            .replace("{page}", &page.to_string())
    }

    pub fn validate(&self) -> Result<(), FinderError> {
        if self.vendor_id.trim().is_empty() {
            return Err(FinderError::InvalidConfig {
                key: format!("{}.vendor_id", self.name),
                reason: "vendor id must not be empty".to_string(),
            });
        }
        if !self.page_url_pattern.contains("{page}") {
            return Err(FinderError::InvalidConfig {
                key: format!("{}.page_url_pattern", self.name),
                reason: "pattern must contain a {page} placeholder".to_string(),
            });
        }
        self.selectors.validate(&self.name)
    }
}

/// Ordered candidate locators for each field of a product card
///
/// The first locator that yields a non-empty value wins; later ones are never
/// consulted for that field.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSpec {
    /// Product card containers on a listing page
    pub container: Vec<Locator>,
    /// Product display name
    pub name: Vec<Locator>,
    /// Product page link, usually an `@href` locator
    pub url: Vec<Locator>,
    #[serde(default)]
    pub price: Vec<Locator>,
    /// Stock badge or buy button text
    #[serde(default)]
    pub stock: Vec<Locator>,
    #[serde(default)]
    pub brand: Vec<Locator>,
    #[serde(default)]
    pub image: Vec<Locator>,
    /// Short "label: value" spec fragments shown on the card
    #[serde(default)]
    pub spec_list: Vec<Locator>,
    #[serde(default)]
    pub name_localized: Vec<Locator>,
    /// Pagination controls whose numeric labels reveal the page count
    #[serde(default)]
    pub pagination: Vec<Locator>,
}

impl SelectorSpec {
    fn validate(&self, retailer: &str) -> Result<(), FinderError> {
        let required = [
            ("container", &self.container),
            ("name", &self.name),
            ("url", &self.url),
        ];

        for (field, locators) in required {
            if locators.is_empty() {
                return Err(FinderError::InvalidConfig {
                    key: format!("{retailer}.selectors.{field}"),
                    reason: "at least one locator is required".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Where a field value lives: the text of a matched element, or one of its attributes
///
/// Written as `"css selector"`, `"css selector@attr"`, or `"@attr"` for an
/// attribute of the card element itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Locator {
    raw: String,
    selector: Option<Selector>,
    attribute: Option<String>,
}

impl Locator {
    /// Parse a locator, naming the field it belongs to in any error
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, FinderError> {
        Self::compile(raw).map_err(|reason| FinderError::InvalidSelector {
            field,
            locator: raw.to_string(),
            reason,
        })
    }

    /// Parse a list of locators for one field, keeping their order
    pub fn parse_all(field: &'static str, raw: &[&str]) -> Result<Vec<Self>, FinderError> {
        raw.iter().map(|r| Self::parse(field, r)).collect()
    }

    fn compile(raw: &str) -> Result<Self, String> {
        let (css, attribute) = split_attribute(raw);

        if css.is_empty() && attribute.is_none() {
            return Err("empty locator".to_string());
        }

        let selector = if css.is_empty() {
            None
        } else {
            Some(Selector::parse(css).map_err(|e| format!("{e:?}"))?)
        };

        Ok(Self {
            raw: raw.to_string(),
            selector,
            attribute: attribute.map(str::to_string),
        })
    }

    /// `None` means the locator addresses the fragment root itself
    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for Locator {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::compile(&raw).map_err(|reason| format!("invalid locator '{raw}': {reason}"))
    }
}

/// Split a trailing `@attr` off a locator; `@` inside brackets or quotes stays CSS
fn split_attribute(raw: &str) -> (&str, Option<&str>) {
    match raw.rsplit_once('@') {
        Some((css, attr))
            if !attr.is_empty()
                && attr
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')) =>
        {
            (css.trim(), Some(attr))
        }
        _ => (raw.trim(), None),
    }
}

/// Fetches a page body; the engine's only door to the network
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body
    ///
    /// # Returns
    /// * `Result<String>` - The body, or an error for network failures and non-2xx statuses
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retailer(pattern: &str) -> RetailerConfig {
        RetailerConfig {
            vendor_id: "shop".to_string(),
            name: "Shop".to_string(),
            categories: Vec::new(),
            selectors: SelectorSpec {
                container: Locator::parse_all("container", &["div.card"]).unwrap(),
                name: Locator::parse_all("name", &["h4"]).unwrap(),
                url: Locator::parse_all("url", &["h4 a@href"]).unwrap(),
                price: Vec::new(),
                stock: Vec::new(),
                brand: Vec::new(),
                image: Vec::new(),
                spec_list: Vec::new(),
                name_localized: Vec::new(),
                pagination: Vec::new(),
            },
            page_url_pattern: pattern.to_string(),
            enrich_details: false,
        }
    }

    #[test]
    fn locator_splits_attribute_suffix() {
        let text = Locator::parse("name", "h4.p-item-name a").unwrap();
        assert!(text.selector().is_some());
        assert_eq!(text.attribute(), None);

        let attr = Locator::parse("image", "div.p-item-img img@data-src").unwrap();
        assert!(attr.selector().is_some());
        assert_eq!(attr.attribute(), Some("data-src"));

        let root = Locator::parse("url", "@href").unwrap();
        assert!(root.selector().is_none());
        assert_eq!(root.attribute(), Some("href"));
    }

    #[test]
    fn at_sign_inside_attribute_selector_stays_css() {
        let locator = Locator::parse("url", "a[href='mailto:x@y.com']").unwrap();
        assert_eq!(locator.attribute(), None);
        assert!(locator.selector().is_some());
    }

    #[test]
    fn invalid_css_is_a_config_error() {
        let err = Locator::parse("name", "div[[").unwrap_err();
        assert!(matches!(err, FinderError::InvalidSelector { field: "name", .. }));
        assert!(Locator::parse("name", "   ").is_err());
    }

    #[test]
    fn selector_spec_deserializes_and_requires_core_fields() {
        let json = r#"{
            "vendor_id": "techland",
            "name": "Techland",
            "categories": [{"category_id": "ram", "listing_url": "https://example.com/ram"}],
            "selectors": {
                "container": ["div.product"],
                "name": ["h2 a", "h2"],
                "url": ["h2 a@href"],
                "image": ["img@data-src", "img@src"]
            }
        }"#;
        let config: RetailerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.page_url_pattern, "{url}?page={page}");
        assert!(config.enrich_details);
        assert_eq!(config.selectors.name.len(), 2);
        assert_eq!(config.selectors.image[1].attribute(), Some("src"));
        assert!(config.validate().is_ok());

        let missing_url = r#"{
            "vendor_id": "x", "name": "X", "categories": [],
            "selectors": {"container": ["div"], "name": ["h2"], "url": []}
        }"#;
        let config: RetailerConfig = serde_json::from_str(missing_url).unwrap();
        assert!(matches!(config.validate(), Err(FinderError::InvalidConfig { .. })));

        let bad_css = r#"{
            "vendor_id": "x", "name": "X", "categories": [],
            "selectors": {"container": ["div[["], "name": ["h2"], "url": ["a@href"]}
        }"#;
        assert!(serde_json::from_str::<RetailerConfig>(bad_css).is_err());
    }

    #[test]
    fn page_url_respects_existing_query() {
        let config = retailer("{url}?page={page}");
        assert_eq!(
            config.build_page_url("https://shop.test/component/ram", 3),
            "https://shop.test/component/ram?page=3"
        );
        assert_eq!(
            config.build_page_url("https://shop.test/c?sort=price", 2),
            "https://shop.test/c?sort=price&page=2"
        );

        let path_style = retailer("{url}/page/{page}");
        assert_eq!(
            path_style.build_page_url("https://shop.test/ssd", 4),
            "https://shop.test/ssd/page/4"
        );
    }
}
