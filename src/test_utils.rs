//! Shared fixtures for unit tests: canned pages instead of the network

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::FinderError;
use crate::scrapers::startech;
use crate::traits::{PageFetcher, RetailerConfig};

/// Serves HTML keyed by exact URL; anything else is a 404
#[derive(Default)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// URLs fetched so far, in request order
    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        self.pages.get(url).cloned().ok_or_else(|| {
            FinderError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }
            .into()
        })
    }
}

/// StarTech-style listing markup with `(name, href)` cards and pagination labels
pub fn listing_html(cards: &[(&str, &str)], pagination: &[&str]) -> String {
    let cards: String = cards
        .iter()
        .map(|(name, href)| {
            format!(
                r#"<div class="p-item">
                    <h4 class="p-item-name"><a href="{href}">{name}</a></h4>
                    <div class="p-item-price"><span>1,000৳</span></div>
                    <div class="p-item-stock"><span>In Stock</span></div>
                </div>"#
            )
        })
        .collect();

    let pagination: String = pagination
        .iter()
        .map(|label| format!(r#"<li><a href="?page={label}">{label}</a></li>"#))
        .collect();

    format!(
        r#"<html><body><div class="main-content">{cards}</div><ul class="pagination">{pagination}</ul></body></html>"#
    )
}

/// The built-in StarTech selectors without any configured categories
pub fn test_retailer(enrich_details: bool) -> RetailerConfig {
    let mut retailer = startech::retailer().unwrap();
    retailer.categories.clear();
    retailer.enrich_details = enrich_details;
    retailer
}
