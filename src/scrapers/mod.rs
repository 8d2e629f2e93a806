//! Retailer configurations: built-in presets and JSON-defined retailers

pub mod startech;

use std::path::Path;

use crate::error::FinderError;
use crate::traits::RetailerConfig;

/// Retailers used when no configuration file is given
pub fn builtin_retailers() -> Result<Vec<RetailerConfig>, FinderError> {
    Ok(vec![startech::retailer()?])
}

/// Load and validate retailers from a JSON array of retailer configurations
pub fn load_retailers(path: &Path) -> Result<Vec<RetailerConfig>, FinderError> {
    let source = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|e| FinderError::InvalidConfig {
        key: source.clone(),
        reason: e.to_string(),
    })?;

    parse_retailers(&raw, &source)
}

fn parse_retailers(raw: &str, source: &str) -> Result<Vec<RetailerConfig>, FinderError> {
    let invalid = |reason: String| FinderError::InvalidConfig {
        key: source.to_string(),
        reason,
    };

    let retailers: Vec<RetailerConfig> =
        serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

    if retailers.is_empty() {
        return Err(invalid("no retailers configured".to_string()));
    }

    for retailer in &retailers {
        retailer.validate()?;
    }

    Ok(retailers)
}
