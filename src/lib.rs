//! Scheduled PC-component catalog refresh from retailer listing pages
//!
//! One generic engine driven by per-retailer [`traits::SelectorSpec`] values:
//! listing pages are paginated and extracted, product pages optionally
//! enriched, and every card is upserted as a component plus a vendor price.

pub mod config;
pub mod database;
pub mod error;
pub mod finder;
pub mod models;
pub mod scraper;
pub mod scrapers;
pub mod traits;

#[cfg(test)]
mod test_utils;

pub use finder::{ComponentFinder, RunSummary};
