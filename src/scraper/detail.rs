//! Detail-page enrichment: dedicated attributes and power draw
//!
//! Two passes over a product page. The structured pass walks every table row
//! with at least two cells and routes it by label, either into a dedicated
//! attribute or into the open specifications map. When no row yields a
//! power draw, the visible page text is scanned for the first `<n> W` figure.
//!
//! Every failure here (network, missing table, no match) resolves to "no
//! value" for the affected attribute, never to an error for the record.

use std::ops::Range;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::models::DetailAttributes;
use crate::traits::PageFetcher;

use super::extract::element_text;
use super::normalize::normalize_label;

/// Sanity bound for wattage figures; anything outside is treated as noise
pub const PLAUSIBLE_WATTS: Range<i32> = 10..1500;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static WATTAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*w(?:atts?)?\b").unwrap());

const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    PowerDraw,
    Socket,
    Chipset,
    MemoryType,
    FormFactor,
}

/// Label substrings and the attribute they feed, checked in order
const LABELS: &[(&str, Attribute)] = &[
    ("default tdp", Attribute::PowerDraw),
    ("power consumption", Attribute::PowerDraw),
    ("consumption", Attribute::PowerDraw),
    ("socket", Attribute::Socket),
    ("chipset", Attribute::Chipset),
    ("supported memory", Attribute::MemoryType),
    ("memory type", Attribute::MemoryType),
    ("form factor", Attribute::FormFactor),
];

/// Visits product pages and pulls out supplementary attributes
#[derive(Clone)]
pub struct DetailEnricher {
    fetcher: Arc<dyn PageFetcher>,
}

impl DetailEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch a product page and extract its attributes; failures yield empty attributes
    pub async fn enrich(&self, product_url: &str) -> DetailAttributes {
        match self.fetcher.fetch(product_url).await {
            Ok(html) => parse_detail_page(&html),
            Err(e) => {
                warn!("Could not fetch detail page {}: {:#}", product_url, e);
                DetailAttributes::default()
            }
        }
    }
}

/// Run both passes over a detail page body
pub fn parse_detail_page(html: &str) -> DetailAttributes {
    let document = Html::parse_document(html);
    let mut attributes = structured_pass(&document);

    if attributes.power_consumption_watts.is_none() {
        attributes.power_consumption_watts = wattage_from_text(&visible_text(&document));
    }

    attributes
}

fn structured_pass(document: &Html) -> DetailAttributes {
    let mut attributes = DetailAttributes::default();

    for row in document.select(&ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }

        let label = normalize_label(&element_text(cells[0]));
        let value = element_text(cells[1]);
        if label.is_empty() {
            continue;
        }

        if !assign(&mut attributes, &label, &value) {
            attributes.specifications.entry(label).or_insert(value);
        }
    }

    attributes
}

/// Route a row to its dedicated attribute; `false` leaves it for the open map
fn assign(attributes: &mut DetailAttributes, label: &str, value: &str) -> bool {
    let Some(attribute) = LABELS
        .iter()
        .find(|(needle, _)| label.contains(needle))
        .map(|(_, attribute)| *attribute)
    else {
        return false;
    };

    match attribute {
        Attribute::PowerDraw => {
            if attributes.power_consumption_watts.is_some() {
                return false;
            }
            let watts = INTEGER
                .find(value)
                .and_then(|m| m.as_str().parse().ok())
                .filter(|w| PLAUSIBLE_WATTS.contains(w));
            match watts {
                Some(watts) => {
                    debug!("Power draw {}W from row '{}'", watts, label);
                    attributes.power_consumption_watts = Some(watts);
                    true
                }
                None => false,
            }
        }
        Attribute::Socket => fill(&mut attributes.socket, value),
        Attribute::Chipset => fill(&mut attributes.chipset, value),
        Attribute::MemoryType => fill(&mut attributes.memory_type, value),
        Attribute::FormFactor => fill(&mut attributes.form_factor, value),
    }
}

fn fill(slot: &mut Option<String>, value: &str) -> bool {
    if slot.is_some() || value.is_empty() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}

/// First `<integer> W` figure in free text, if it falls in the plausibility band
///
/// Only the first match is considered; an implausible first match means "not found".
pub fn wattage_from_text(text: &str) -> Option<i32> {
    let lower = text.to_lowercase();
    let captures = WATTAGE.captures(&lower)?;
    let watts: i32 = captures.get(1)?.as_str().parse().ok()?;

    if PLAUSIBLE_WATTS.contains(&watts) {
        debug!("Power draw {}W from page text", watts);
        Some(watts)
    } else {
        debug!("Ignoring implausible wattage {}W in page text", watts);
        None
    }
}

/// Page text outside scripts, styles and templates
fn visible_text(document: &Html) -> String {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node.parent()?.value().as_element()?;
            (!HIDDEN_ELEMENTS.contains(&parent.name())).then_some(&**text)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
