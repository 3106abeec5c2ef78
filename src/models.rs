//! Data models flowing through the digest pipeline.
//!
//! This module defines the values each stage hands to the next:
//! - [`RawPage`]: Markup fetched from a single URL
//! - [`ArticleCandidate`]: An article URL discovered on the listing page
//! - [`Article`]: Title, author and body extracted from one article page
//! - [`DigestResult`]: Headline, combined summary and per-article summaries
//!
//! Nothing here outlives a single run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Markup fetched from a URL.
///
/// Owned by the fetch that produced it and dropped once extraction is done.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL that was requested.
    pub url: Url,
    /// The response body as text.
    pub html: String,
    /// When the response was received.
    pub fetched_at: DateTime<Utc>,
}

/// An article URL discovered on a listing page.
///
/// Candidates are unique by their normalized absolute URL and keep the order
/// in which they first appeared on the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleCandidate {
    pub url: Url,
}

/// An article extracted from a single page.
///
/// `title` is never empty and `body` always meets the configured minimum
/// length; pages failing either are skipped before an `Article` exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Byline with boilerplate removed, or empty when none was found.
    pub author: String,
    pub body: String,
    pub source_url: String,
}

/// One entry in the "Articles" section of a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    pub author: String,
    /// Summary text, never longer than the configured word budget.
    pub summary: String,
    pub url: String,
}

/// The assembled digest for one run.
///
/// `summaries` are in the same order as the articles they were produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestResult {
    pub headline: String,
    pub combined_summary: String,
    pub summaries: Vec<ArticleSummary>,
}
