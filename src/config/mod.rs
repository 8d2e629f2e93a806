//! # Runtime Configuration
//!
//! Everything the engine needs is read once at startup and passed in
//! explicitly; nothing is kept in process-wide state.
//!
//! ## Environment
//!
//! - `DATABASE_URL` (required): destination database, e.g. `sqlite:database/components.db`
//! - `RETAILERS_CONFIG`: JSON file with retailer configurations (default: built-in StarTech)
//! - `REQUEST_DELAY_MS`: minimum interval between requests to one host (default 1000)
//! - `REQUEST_TIMEOUT_SECS`: per-request timeout (default 10)
//! - `FETCH_RETRIES`: retries after a failed request (default 2)
//! - `DETAIL_WORKERS`: concurrent detail-page fetches (default 4)
//! - `MAX_PAGES`: page cap per category (default 50)
//! - `RUN_DEADLINE_SECS`: overall run deadline (default 3600)
//! - `REFRESH_CRON`: keep running and refresh on this cron schedule
//!
//! A `.env` file is honored through `dotenvy` in the binary.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::FinderError;
use crate::scrapers;
use crate::traits::RetailerConfig;

/// HTTP behavior shared by listing and detail fetches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub request_delay: Duration,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
            retries: 2,
        }
    }
}

/// Limits for a single refresh run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub detail_workers: usize,
    pub max_pages: u32,
    pub run_deadline: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            detail_workers: 4,
            max_pages: 50,
            run_deadline: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub retailers: Vec<RetailerConfig>,
    pub fetch: FetchSettings,
    pub run: RunSettings,
    pub refresh_cron: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, FinderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FinderError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(FinderError::MissingConfig("DATABASE_URL"))?;

        let retailers = match lookup("RETAILERS_CONFIG") {
            Some(path) => scrapers::load_retailers(Path::new(&path))?,
            None => scrapers::builtin_retailers()?,
        };

        let fetch_defaults = FetchSettings::default();
        let fetch = FetchSettings {
            request_delay: Duration::from_millis(parse_var(
                &lookup,
                "REQUEST_DELAY_MS",
                fetch_defaults.request_delay.as_millis() as u64,
            )?),
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                fetch_defaults.timeout.as_secs(),
            )?),
            retries: parse_var(&lookup, "FETCH_RETRIES", fetch_defaults.retries)?,
        };

        let run_defaults = RunSettings::default();
        let run = RunSettings {
            detail_workers: parse_var(&lookup, "DETAIL_WORKERS", run_defaults.detail_workers)?.max(1),
            max_pages: parse_var(&lookup, "MAX_PAGES", run_defaults.max_pages)?.max(1),
            run_deadline: Duration::from_secs(parse_var(
                &lookup,
                "RUN_DEADLINE_SECS",
                run_defaults.run_deadline.as_secs(),
            )?),
        };

        let refresh_cron = lookup("REFRESH_CRON").filter(|cron| !cron.trim().is_empty());

        Ok(Self {
            database_url,
            retailers,
            fetch,
            run,
            refresh_cron,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, FinderError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| FinderError::InvalidConfig {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, FinderError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(config(&[]), Err(FinderError::MissingConfig("DATABASE_URL"))));
        assert!(matches!(
            config(&[("DATABASE_URL", "  ")]),
            Err(FinderError::MissingConfig("DATABASE_URL"))
        ));
    }

    #[test]
    fn defaults_apply_without_tunables() {
        let config = config(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();
        assert_eq!(config.fetch, FetchSettings::default());
        assert_eq!(config.run, RunSettings::default());
        assert_eq!(config.retailers.len(), 1);
        assert_eq!(config.refresh_cron, None);
    }

    #[test]
    fn tunables_override_defaults() {
        let config = config(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("REQUEST_DELAY_MS", "250"),
            ("FETCH_RETRIES", "0"),
            ("DETAIL_WORKERS", "0"),
            ("MAX_PAGES", "5"),
            ("REFRESH_CRON", "0 0 */6 * * *"),
        ])
        .unwrap();

        assert_eq!(config.fetch.request_delay, Duration::from_millis(250));
        assert_eq!(config.fetch.retries, 0);
        assert_eq!(config.run.detail_workers, 1);
        assert_eq!(config.run.max_pages, 5);
        assert_eq!(config.refresh_cron.as_deref(), Some("0 0 */6 * * *"));
    }

    #[test]
    fn unparsable_tunable_is_fatal() {
        let err = config(&[("DATABASE_URL", "sqlite::memory:"), ("MAX_PAGES", "many")]).unwrap_err();
        assert!(matches!(err, FinderError::InvalidConfig { key, .. } if key == "MAX_PAGES"));
    }
}
