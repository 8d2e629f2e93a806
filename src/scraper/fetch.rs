//! HTTP fetching with a fixed user agent, per-host pacing and bounded retry

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::FetchSettings;
use crate::error::FinderError;
use crate::traits::PageFetcher;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Keeps consecutive requests to one host at least `min_interval` apart
///
/// A zero interval disables pacing.
pub struct HostRateLimiter {
    limiter: Option<DefaultKeyedRateLimiter<String>>,
}

impl HostRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(min_interval).map(RateLimiter::keyed),
        }
    }

    /// Wait until a request to `host` is allowed
    pub async fn wait(&self, host: &str) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        let key = host.to_string();
        if limiter.check_key(&key).is_err() {
            debug!("Rate limiting: waiting for {}", host);
            limiter.until_key_ready(&key).await;
        }
    }
}

/// Production [`PageFetcher`] over `reqwest`
pub struct HttpFetcher {
    client: Client,
    limiter: HostRateLimiter,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            limiter: HostRateLimiter::new(settings.request_delay),
            retries: settings.retries,
            backoff: BASE_BACKOFF,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        self.limiter.wait(&host_of(url)).await;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FinderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        with_retries(url, self.retries, self.backoff, || self.fetch_once(url)).await
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or
/// `retries` extra attempts are used up
///
/// The wait doubles after each failure, starting at `backoff`.
async fn with_retries<T, F, Fut>(url: &str, retries: u32, backoff: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if retry < retries && is_retryable(&e) => {
                retry += 1;
                let wait = backoff * 2u32.pow(retry - 1);
                warn!(
                    "Fetch of {} failed ({:#}); retry {}/{} in {}ms",
                    url,
                    e,
                    retry,
                    retries,
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_default()
}

fn is_retryable(error: &anyhow::Error) -> bool {
    if let Some(error) = error.downcast_ref::<FinderError>() {
        return error.is_retryable();
    }

    error
        .downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout() || e.is_connect() || e.is_request())
}
