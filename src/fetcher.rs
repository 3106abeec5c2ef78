//! HTTP page fetching with bounded retries.
//!
//! The [`Fetcher`] wraps a single `reqwest::Client` configured with the
//! browser user agent and request timeout from [`DigestConfig`]. Failed
//! attempts back off linearly (`delay`, `2 * delay`, ...) before the next try.
//!
//! Whether a final failure is fatal is decided by the caller: the listing page
//! ends the run, an article page is skipped.

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::models::RawPage;
use chrono::Utc;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to fetch {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: usize,
        last: Box<FetchError>,
    },
}

/// Page fetcher shared by every stage that needs markup.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    attempts: usize,
    retry_delay: Duration,
}

impl Fetcher {
    /// Build a fetcher from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Configuration`] if the HTTP client cannot be built
    /// (for example, an invalid user agent string).
    pub fn new(config: &DigestConfig) -> Result<Self, DigestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DigestError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            attempts: config.fetch_retries,
            retry_delay: config.fetch_retry_delay(),
        })
    }

    /// Fetch `url`, retrying failed attempts.
    ///
    /// Non-2xx responses count as failures.
    #[instrument(level = "info", skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        let t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.fetch_once(url).await {
                Ok(page) => {
                    debug!(
                        attempt,
                        bytes = page.html.len(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Fetched page"
                    );
                    return Ok(page);
                }
                Err(e) if attempt >= self.attempts => {
                    info!(attempt, error = %e, "Fetch exhausted retries");
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.retry_delay.saturating_mul(attempt as u32);
                    debug!(attempt, ?delay, error = %e, "Fetch attempt failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<RawPage, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let html = response.text().await.map_err(request_error)?;

        Ok(RawPage {
            url: url.clone(),
            html,
            fetched_at: Utc::now(),
        })
    }

    /// Whether the site's robots.txt leaves the site open to crawlers.
    ///
    /// Only a blanket `Disallow: /` for `User-agent: *` counts as a refusal.
    /// A missing or unreachable robots.txt counts as allowed.
    #[instrument(level = "debug", skip_all, fields(base = %base))]
    pub async fn robots_allows(&self, base: &Url) -> bool {
        let Ok(robots_url) = base.join("/robots.txt") else {
            return true;
        };
        let response = match self.client.get(robots_url).send().await {
            Ok(r) if r.status().is_success() => r,
            _ => return true,
        };
        match response.text().await {
            Ok(text) => {
                let allowed = !robots_disallows_everything(&text);
                info!(allowed, "Checked robots.txt");
                allowed
            }
            Err(_) => true,
        }
    }
}

/// Look for `Disallow: /` within the four lines following `User-agent: *`.
fn robots_disallows_everything(robots: &str) -> bool {
    let lines: Vec<String> = robots.lines().map(|l| l.trim().to_lowercase()).collect();
    lines.iter().enumerate().any(|(i, line)| {
        line == "user-agent: *"
            && lines
                .iter()
                .skip(i + 1)
                .take(4)
                .any(|l| l == "disallow: /")
    })
}
