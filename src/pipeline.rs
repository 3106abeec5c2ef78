//! The digest run: scrape, extract, summarize, format, write.
//!
//! Stages run strictly in sequence. Per-article failures (fetch errors,
//! missing titles, short bodies) drop that article and are logged; every other
//! failure ends the run before anything is written.

use crate::api::AskAsync;
use crate::config::DigestConfig;
use crate::digest::assemble;
use crate::error::{DigestError, SkipReason};
use crate::extract::extract;
use crate::fetcher::Fetcher;
use crate::links::discover;
use crate::models::{Article, ArticleCandidate};
use crate::outputs::{self, Destination, OutputFormat};
use crate::selectors::SelectorRegistry;
use crate::utils::ensure_writable_parent;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// What the operator asked for.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Listing page URL as typed by the operator.
    pub url: String,
    /// Articles wanted in the digest.
    pub count: usize,
    pub destination: Destination,
    pub format: OutputFormat,
}

/// The collaborators a run needs, built once at startup.
pub struct Pipeline<'a, A> {
    pub config: &'a DigestConfig,
    pub registry: &'a SelectorRegistry,
    pub fetcher: &'a Fetcher,
    pub service: &'a A,
}

/// Parse the operator's URL, assuming https when no scheme is given.
pub fn normalize_listing_url(raw: &str) -> Result<Url, DigestError> {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&with_scheme).map_err(|source| DigestError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

impl<'a, A> Pipeline<'a, A>
where
    A: AskAsync<Response = String>,
{
    /// Run the whole pipeline once.
    #[instrument(level = "info", skip_all, fields(url = %options.url, count = options.count))]
    pub async fn run(&self, options: &RunOptions) -> Result<(), DigestError> {
        let start_time = Instant::now();
        if options.count == 0 {
            return Err(DigestError::Configuration("article count must be at least 1".into()));
        }
        let listing_url = normalize_listing_url(&options.url)?;

        if let Destination::File(path) = &options.destination {
            ensure_writable_parent(path)
                .await
                .map_err(|source| DigestError::Output {
                    path: path.display().to_string(),
                    source,
                })?;
        }

        let articles = self.collect_articles(&listing_url, options.count).await?;
        info!(count = articles.len(), "Extracted articles");

        let digest = assemble(&articles, self.service, self.config).await?;
        let text = outputs::render(&digest, options.format)?;
        outputs::write(&text, &options.destination).await?;

        info!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            articles = digest.summaries.len(),
            "Digest complete"
        );
        Ok(())
    }

    /// Fetch the listing page and extract up to `count` articles from it.
    ///
    /// Candidates are tried in discovery order; skipped articles are replaced
    /// by later candidates while any remain.
    ///
    /// # Errors
    ///
    /// - [`DigestError::Fetch`] if the listing page cannot be fetched
    /// - [`DigestError::EmptyResult`] if no links are found or every article is skipped
    pub async fn collect_articles(
        &self,
        listing_url: &Url,
        count: usize,
    ) -> Result<Vec<Article>, DigestError> {
        let listing = self.fetcher.fetch(listing_url).await?;
        debug!(fetched_at = %listing.fetched_at, bytes = listing.html.len(), "Fetched listing page");

        if !self.fetcher.robots_allows(listing_url).await {
            warn!(url = %listing_url, "robots.txt may disallow scraping; proceeding with caution");
        }

        let max_candidates = count.saturating_mul(self.config.candidate_multiplier);
        let candidates = discover(&listing.html, &listing.url, max_candidates, self.registry)?;
        let total = candidates.len();

        let articles: Vec<Article> = stream::iter(candidates.into_iter().enumerate())
            .then(|(i, candidate)| async move {
                match self.scrape_article(&candidate).await {
                    Ok(article) => {
                        debug!(index = i, title = %article.title, "Extracted article");
                        sleep(self.config.politeness_delay()).await;
                        Some(article)
                    }
                    Err(reason) => {
                        info!(index = i, url = %candidate.url, %reason, "Skipping article");
                        None
                    }
                }
            })
            .filter_map(std::future::ready)
            .take(count)
            .collect()
            .await;

        info!(candidates = total, extracted = articles.len(), "Scraped articles");
        if articles.is_empty() {
            return Err(DigestError::EmptyResult {
                url: listing_url.to_string(),
            });
        }
        Ok(articles)
    }

    async fn scrape_article(&self, candidate: &ArticleCandidate) -> Result<Article, SkipReason> {
        let page = self.fetcher.fetch(&candidate.url).await?;
        extract(&page.html, page.url.as_str(), self.registry, self.config)
    }
}
