use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, RunSettings};
use crate::database::Database;
use crate::models::{CategoryTarget, Component, ListingPage, Price};
use crate::scraper::Scraper;
use crate::scraper::detail::DetailEnricher;
use crate::scraper::fetch::HttpFetcher;
use crate::scraper::normalize::build_records;
use crate::traits::{PageFetcher, RetailerConfig};

/// Counters for one refresh run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: usize,
    pub cards: usize,
    pub upserted: usize,
    /// Cards seen again under the same identity within a category
    pub skipped: usize,
    pub failed: usize,
    pub deadline_reached: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} cards, {} upserted, {} skipped, {} failed",
            self.pages, self.cards, self.upserted, self.skipped, self.failed
        )?;
        if self.deadline_reached {
            write!(f, " (stopped at deadline)")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ComponentFinder {
    scraper: Scraper,
    enricher: DetailEnricher,
    database: Database,
    retailers: Arc<Vec<RetailerConfig>>,
    settings: RunSettings,
}

impl ComponentFinder {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
        let database = Database::connect(&config.database_url)
            .await
            .context("Failed to open the destination database")?;

        let finder = Self::with_parts(fetcher, database, config.retailers.clone(), config.run.clone());
        finder.check_vendors().await?;
        Ok(finder)
    }

    pub fn with_parts(
        fetcher: Arc<dyn PageFetcher>,
        database: Database,
        retailers: Vec<RetailerConfig>,
        settings: RunSettings,
    ) -> Self {
        Self {
            scraper: Scraper::new(Arc::clone(&fetcher), settings.max_pages),
            enricher: DetailEnricher::new(fetcher),
            database,
            retailers: Arc::new(retailers),
            settings,
        }
    }

    /// Warn about configured vendor ids with no row in `vendors`
    ///
    /// Returns the ids that are unknown.
    pub async fn check_vendors(&self) -> Result<Vec<String>> {
        let mut unknown = Vec::new();
        for retailer in self.retailers.iter() {
            if self.database.get_vendor(&retailer.vendor_id).await?.is_none() {
                warn!(
                    "Vendor '{}' ({}) is not registered in the vendors table",
                    retailer.vendor_id, retailer.name
                );
                unknown.push(retailer.vendor_id.clone());
            }
        }
        Ok(unknown)
    }

    /// Refresh every configured category of every retailer
    ///
    /// Page and record failures are logged and counted; only a database that
    /// cannot be prepared for writing ends the run with an error.
    pub async fn refresh(&self) -> Result<RunSummary> {
        let deadline = Instant::now() + self.settings.run_deadline;
        let mut summary = RunSummary::default();

        self.database
            .ensure_schema()
            .await
            .context("Failed to prepare the database schema")?;

        'retailers: for retailer in self.retailers.iter() {
            info!("Refreshing {} ({} categories)", retailer.name, retailer.categories.len());

            for target in &retailer.categories {
                if !self.refresh_category(retailer, target, deadline, &mut summary).await {
                    break 'retailers;
                }
            }
        }

        if summary.deadline_reached {
            warn!("Run deadline reached, stopping early: {}", summary);
        } else {
            info!("Refresh complete: {}", summary);
        }

        Ok(summary)
    }

    /// Returns `false` once the run deadline has passed
    async fn refresh_category(
        &self,
        retailer: &RetailerConfig,
        target: &CategoryTarget,
        deadline: Instant,
        summary: &mut RunSummary,
    ) -> bool {
        let mut seen = HashSet::new();
        let mut pages = self.scraper.pages(retailer, target);

        loop {
            if Instant::now() >= deadline {
                summary.deadline_reached = true;
                return false;
            }

            let Some(page) = pages.next_page().await else {
                return true;
            };

            summary.pages += 1;
            summary.cards += page.cards.len();

            if !self.process_page(retailer, target, page, &mut seen, deadline, summary).await {
                return false;
            }
        }
    }

    async fn process_page(
        &self,
        retailer: &RetailerConfig,
        target: &CategoryTarget,
        page: ListingPage,
        seen: &mut HashSet<String>,
        deadline: Instant,
        summary: &mut RunSummary,
    ) -> bool {
        let now = Utc::now();
        let mut records = Vec::with_capacity(page.cards.len());

        for card in &page.cards {
            let (component, price) = build_records(card, &target.category_id, &retailer.vendor_id, now);
            if !seen.insert(component.id.clone()) {
                debug!("Duplicate card {} on page {}", component.id, page.index);
                summary.skipped += 1;
                continue;
            }
            records.push((component, price));
        }

        let enrich = retailer.enrich_details;
        let enricher = &self.enricher;
        let mut enriched = stream::iter(records)
            .map(|(mut component, price)| async move {
                if enrich {
                    let details = enricher.enrich(&price.source_url).await;
                    component.apply_details(details);
                }
                (component, price)
            })
            .buffer_unordered(self.settings.detail_workers.max(1));

        while let Some((component, price)) = enriched.next().await {
            if Instant::now() >= deadline {
                summary.deadline_reached = true;
                return false;
            }

            if self.store(&component, &price).await {
                summary.upserted += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "Page {} of {} on {}: {} cards from {} containers",
            page.index,
            target.category_id,
            retailer.name,
            page.cards.len(),
            page.container_count
        );
        true
    }

    async fn store(&self, component: &Component, price: &Price) -> bool {
        match self.database.upsert(component, price).await {
            Ok(()) => {
                debug!("Upserted {} at {} for {}", component.id, price.price, price.vendor_id);
                true
            }
            Err(e) => {
                warn!("Skipping record {}: {:#}", component.id, e);
                false
            }
        }
    }
}
