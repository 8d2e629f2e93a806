//! Generic listing scraper driven entirely by a retailer's [`SelectorSpec`]
//!
//! One engine serves every retailer; only the configuration differs.

pub mod detail;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod pagination;

use std::sync::Arc;

use anyhow::Result;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};
use url::Url;

use crate::models::{CategoryTarget, ListingPage, RawCard};
use crate::traits::{PageFetcher, RetailerConfig, SelectorSpec};

use extract::{extract, extract_all, select_first_matching};
use pagination::CategoryPages;

pub struct Scraper {
    fetcher: Arc<dyn PageFetcher>,
    max_pages: u32,
}

impl Scraper {
    /// `max_pages` caps every category as a guard against endless pagination
    pub fn new(fetcher: Arc<dyn PageFetcher>, max_pages: u32) -> Self {
        Self {
            fetcher,
            max_pages: max_pages.max(1),
        }
    }

    /// Number of listing pages for a category, read from its pagination controls
    ///
    /// Fails open: no pagination UI or a failed fetch both give 1.
    pub async fn discover_page_count(&self, retailer: &RetailerConfig, listing_url: &str) -> u32 {
        match self.fetch_listing(retailer, listing_url, 1).await {
            Ok((_, page_count)) => page_count.unwrap_or(1),
            Err(e) => {
                warn!("Could not fetch page 1 of {} to count pages: {:#}", listing_url, e);
                1
            }
        }
    }

    /// Fetch one listing page and extract its cards
    ///
    /// # Returns
    /// * `Result<ListingPage>` - The page (possibly without containers), or the fetch error
    pub async fn fetch_page(
        &self,
        retailer: &RetailerConfig,
        listing_url: &str,
        page: u32,
    ) -> Result<ListingPage> {
        Ok(self.fetch_listing(retailer, listing_url, page).await?.0)
    }

    /// Fetch one listing page, returning its cards and the page count its
    /// pagination controls advertise
    pub async fn fetch_listing(
        &self,
        retailer: &RetailerConfig,
        listing_url: &str,
        page: u32,
    ) -> Result<(ListingPage, Option<u32>)> {
        let url = retailer.build_page_url(listing_url, page);
        let html = self.fetcher.fetch(&url).await?;
        Ok(parse_listing(&html, &url, &retailer.selectors, page))
    }

    /// Sequential page source for one category
    pub fn pages<'a>(
        &'a self,
        retailer: &'a RetailerConfig,
        target: &'a CategoryTarget,
    ) -> CategoryPages<'a> {
        CategoryPages::new(self, retailer, target)
    }

    pub(crate) fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

impl Clone for Scraper {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            max_pages: self.max_pages,
        }
    }
}

/// Extract cards from a listing page body, plus the page count its
/// pagination controls advertise (if any)
///
/// Cards missing a name or URL are discarded but still counted as containers,
/// so a page of broken cards is not mistaken for the end of the listing.
pub fn parse_listing(
    html: &str,
    page_url: &str,
    selectors: &SelectorSpec,
    index: u32,
) -> (ListingPage, Option<u32>) {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let base = Url::parse(page_url).ok();

    let containers = select_first_matching(root, &selectors.container);
    let container_count = containers.len();

    let cards: Vec<RawCard> = containers
        .into_iter()
        .filter_map(|container| parse_card(container, selectors, base.as_ref()))
        .collect();

    if cards.len() < container_count {
        debug!(
            "Discarded {} of {} cards on {} without a name or link",
            container_count - cards.len(),
            container_count,
            page_url
        );
    }

    let page_count = page_count_from(root, selectors);

    (
        ListingPage {
            index,
            container_count,
            cards,
        },
        page_count,
    )
}

fn parse_card(card: ElementRef<'_>, selectors: &SelectorSpec, base: Option<&Url>) -> Option<RawCard> {
    let name = extract(card, &selectors.name)?;
    let href = extract(card, &selectors.url)?;

    Some(RawCard {
        name,
        url: resolve_url(base, &href),
        price_text: extract(card, &selectors.price),
        stock_text: extract(card, &selectors.stock),
        brand_text: extract(card, &selectors.brand),
        image_url: extract(card, &selectors.image).map(|src| resolve_url(base, &src)),
        name_localized: extract(card, &selectors.name_localized),
        spec_texts: extract_all(card, &selectors.spec_list),
    })
}

/// Largest numeric label among the pagination controls
fn page_count_from(root: ElementRef<'_>, selectors: &SelectorSpec) -> Option<u32> {
    extract_all(root, &selectors.pagination)
        .iter()
        .filter_map(|label| label.trim().parse::<u32>().ok())
        .filter(|count| *count >= 1)
        .max()
}

/// Make a link absolute against the page it was found on
fn resolve_url(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map_or_else(|| href.to_string(), String::from)
}
