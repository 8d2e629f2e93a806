//! Typed failures that decide whether a run keeps going or stops.
//!
//! Configuration problems are fatal at startup. Fetch failures are contained
//! at the page or record that triggered them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("invalid locator '{locator}' for field {field}: {reason}")]
    InvalidSelector {
        field: &'static str,
        locator: String,
        reason: String,
    },

    #[error("request to {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },
}

impl FinderError {
    /// Server-side failures are worth another attempt; client errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status >= 500)
    }
}
