//! Ordered-fallback field resolution over a parsed page fragment

use scraper::ElementRef;
use tracing::debug;

use crate::traits::Locator;

/// Resolve a field by trying `locators` in declared order
///
/// The first locator that yields a non-empty value wins; nothing is merged
/// and later locators are not consulted. `None` means no locator matched,
/// which the caller may treat as fatal or as an unknown value.
pub fn extract(fragment: ElementRef<'_>, locators: &[Locator]) -> Option<String> {
    locators.iter().find_map(|locator| {
        let value = matched(fragment, locator)
            .into_iter()
            .find_map(|element| value_of(element, locator));

        if value.is_some() {
            debug!("Field resolved by locator '{}'", locator.as_str());
        }
        value
    })
}

/// Every non-empty value of the first locator that yields at least one
pub fn extract_all(fragment: ElementRef<'_>, locators: &[Locator]) -> Vec<String> {
    locators
        .iter()
        .map(|locator| {
            matched(fragment, locator)
                .into_iter()
                .filter_map(|element| value_of(element, locator))
                .collect::<Vec<_>>()
        })
        .find(|values| !values.is_empty())
        .unwrap_or_default()
}

/// Elements matched by the first locator that matches anything at all
pub fn select_first_matching<'a>(root: ElementRef<'a>, locators: &[Locator]) -> Vec<ElementRef<'a>> {
    locators
        .iter()
        .map(|locator| matched(root, locator))
        .find(|elements| !elements.is_empty())
        .unwrap_or_default()
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

fn matched<'a>(fragment: ElementRef<'a>, locator: &Locator) -> Vec<ElementRef<'a>> {
    match locator.selector() {
        Some(selector) => fragment.select(selector).collect(),
        None => vec![fragment],
    }
}

fn value_of(element: ElementRef<'_>, locator: &Locator) -> Option<String> {
    let value = match locator.attribute() {
        Some(attribute) => element.value().attr(attribute)?.trim().to_string(),
        None => element_text(element),
    };

    (!value.is_empty()).then_some(value)
}
