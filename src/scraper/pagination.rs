//! Sequential listing-page source for one category
//!
//! Two termination styles are handled without the caller knowing which one a
//! retailer uses: an explicit page count read from page 1's pagination
//! controls, and an empty page (zero product containers) as the end marker.

use tracing::{info, warn};

use crate::models::{CategoryTarget, ListingPage};
use crate::traits::RetailerConfig;

use super::Scraper;

/// Failed fetches in a row after which a listing without a known page count
/// is considered exhausted
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

pub struct CategoryPages<'a> {
    scraper: &'a Scraper,
    retailer: &'a RetailerConfig,
    target: &'a CategoryTarget,
    next: u32,
    limit: Option<u32>,
    failures: u32,
    finished: bool,
}

impl<'a> CategoryPages<'a> {
    pub(super) fn new(
        scraper: &'a Scraper,
        retailer: &'a RetailerConfig,
        target: &'a CategoryTarget,
    ) -> Self {
        Self {
            scraper,
            retailer,
            target,
            next: 1,
            limit: None,
            failures: 0,
            finished: false,
        }
    }

    /// Fetch the next page with products, or `None` once the category is exhausted
    ///
    /// A failed page is logged and skipped. When page 1 gave no page count,
    /// [`MAX_CONSECUTIVE_FAILURES`] failures in a row end the category.
    pub async fn next_page(&mut self) -> Option<ListingPage> {
        loop {
            if self.finished {
                return None;
            }

            let index = self.next;
            if index > self.scraper.max_pages() {
                info!(
                    "Reached maximum page limit ({}) for {} on {}",
                    self.scraper.max_pages(),
                    self.target.category_id,
                    self.retailer.name
                );
                self.finished = true;
                return None;
            }
            if self.limit.is_some_and(|limit| index > limit) {
                self.finished = true;
                return None;
            }
            self.next += 1;

            info!(
                "Fetching page {} of {} on {}",
                index, self.target.category_id, self.retailer.name
            );

            let (page, page_count) = match self
                .scraper
                .fetch_listing(self.retailer, &self.target.listing_url, index)
                .await
            {
                Ok(listing) => listing,
                Err(e) => {
                    self.failures += 1;
                    warn!(
                        "Skipping page {} of {}: {:#}",
                        index, self.target.category_id, e
                    );
                    if self.limit.is_none() && self.failures >= MAX_CONSECUTIVE_FAILURES {
                        warn!(
                            "{} failed pages in a row; finished {} on {}",
                            self.failures, self.target.category_id, self.retailer.name
                        );
                        self.finished = true;
                    }
                    continue;
                }
            };
            self.failures = 0;

            if index == 1 {
                self.limit = page_count;
            }

            if page.container_count == 0 {
                info!(
                    "No products on page {}; finished {} on {}",
                    index, self.target.category_id, self.retailer.name
                );
                self.finished = true;
                return None;
            }

            return Some(page);
        }
    }
}
