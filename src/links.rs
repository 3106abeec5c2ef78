//! Article link discovery on a listing page.
//!
//! Link rules from the [`SelectorRegistry`] locate listing entries (cards,
//! `article` blocks, anchors in the main content area). Each entry contributes
//! one `href`, which is resolved against the listing URL and kept only if it
//! looks like an article on the same site.
//!
//! # Acceptance
//!
//! A link is dropped when it:
//! - is a fragment, `javascript:` or `mailto:` link, or not http(s)
//! - points to another host, or back to the listing page itself
//! - has no path, or fewer path segments than the rule requires
//! - looks like a utility page (tags, categories, authors, search, feeds, ...)

use crate::error::DigestError;
use crate::models::ArticleCandidate;
use crate::selectors::{Purpose, SelectorRegistry, SelectorRule};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

const UTILITY_PATTERNS: &[&str] = &[
    "/tag/",
    "/tags/",
    "/category/",
    "/categories/",
    "/author/",
    "/page/",
    "/search",
    "/login",
    "/signup",
    "/contact",
    "/about",
    "/privacy",
    "/terms",
    "/subscribe",
    "/feed",
    "/rss",
    "/blog-tag/",
    "/blog-category/",
    "/blog-author/",
    "-tag/",
    "-category/",
    "-author/",
];

/// Paths that are section indexes rather than articles.
const INDEX_PATHS: &[&str] = &["blog", "articles", "posts"];

/// Find up to `max_count` article URLs on a listing page.
///
/// URLs are absolute, unique after dropping fragments, and in the order they
/// first appear on the page.
///
/// # Errors
///
/// Returns [`DigestError::EmptyResult`] naming `base_url` if no rule yields a link.
#[instrument(level = "info", skip_all, fields(base_url = %base_url, max_count))]
pub fn discover(
    listing_html: &str,
    base_url: &Url,
    max_count: usize,
    registry: &SelectorRegistry,
) -> Result<Vec<ArticleCandidate>, DigestError> {
    let document = Html::parse_document(listing_html);

    let found = registry.resolve_all(Purpose::Link, &document, |rule, element| {
        let href = entry_href(element)?;
        let url = resolve_link(base_url, href)?;
        accept(base_url, &url, rule).then_some(url)
    });
    let found_count = found.len();

    let candidates: Vec<ArticleCandidate> = found
        .into_iter()
        .unique_by(|url| url.to_string())
        .take(max_count)
        .map(|url| ArticleCandidate { url })
        .collect();

    if candidates.is_empty() {
        return Err(DigestError::EmptyResult {
            url: base_url.to_string(),
        });
    }

    info!(
        found = found_count,
        kept = candidates.len(),
        max_count,
        "Discovered article links"
    );
    debug!(urls = ?candidates.iter().map(|c| c.url.as_str()).collect::<Vec<_>>(), "Article candidates");
    Ok(candidates)
}

/// The `href` a listing entry contributes: its own when it is an anchor,
/// otherwise that of its first descendant anchor.
fn entry_href(element: ElementRef<'_>) -> Option<&str> {
    if element.value().name() == "a" {
        if let Some(href) = element.value().attr("href") {
            return Some(href);
        }
    }
    element
        .select(&ANCHOR)
        .next()
        .and_then(|a| a.value().attr("href"))
}

/// Resolve `href` against the listing URL and drop its fragment.
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn accept(base: &Url, url: &Url, rule: &SelectorRule) -> bool {
    let (Some(host), Some(base_host)) = (url.host_str(), base.host_str()) else {
        return false;
    };
    if host != base_host && !host.ends_with(&format!(".{base_host}")) {
        return false;
    }

    let mut listing = base.clone();
    listing.set_fragment(None);
    if url.as_str().trim_end_matches('/') == listing.as_str().trim_end_matches('/') {
        return false;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if segments.is_empty() || segments.len() < rule.min_path_segments {
        return false;
    }
    if rule.min_path_segments > 0
        && segments.len() == 1
        && INDEX_PATHS.contains(&segments[0].to_ascii_lowercase().as_str())
    {
        return false;
    }

    // Host names such as rss.example.org must not trip the path patterns.
    let mut target = url.path().to_ascii_lowercase();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(&query.to_ascii_lowercase());
    }
    !UTILITY_PATTERNS.iter().any(|p| target.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SelectorRegistry {
        SelectorRegistry::new(&SelectorRule::defaults()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://blog.example.com/").unwrap()
    }

    fn urls(candidates: &[ArticleCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.url.as_str()).collect()
    }

    #[test]
    fn test_cards_resolved_to_absolute_urls() {
        let html = r#"
            <div class="post-card"><a href="/2024/01/first-post">First</a></div>
            <div class="post-card"><a href="second-post">Second</a></div>
            <div class="post-card"><a href="https://blog.example.com/third">Third</a></div>
        "#;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(
            urls(&found),
            vec![
                "https://blog.example.com/2024/01/first-post",
                "https://blog.example.com/second-post",
                "https://blog.example.com/third",
            ]
        );
    }

    #[test]
    fn test_duplicates_removed_in_first_seen_order() {
        let html = r#"
            <article><a href="/b">B</a></article>
            <article><a href="/a">A</a></article>
            <article><a href="/b#comments">B again</a></article>
            <article><a href="https://blog.example.com/a">A again</a></article>
        "#;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(
            urls(&found),
            vec!["https://blog.example.com/b", "https://blog.example.com/a"]
        );
    }

    #[test]
    fn test_truncated_to_max_count() {
        let html: String = (0..8)
            .map(|i| format!(r#"<article><a href="/post-{i}">P</a></article>"#))
            .collect();
        let found = discover(&html, &base(), 3, &registry()).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].url.as_str(), "https://blog.example.com/post-0");
    }

    #[test]
    fn test_utility_and_offsite_links_skipped() {
        let html = r##"
            <main>
              <a href="#top">Top</a>
              <a href="javascript:void(0)">JS</a>
              <a href="mailto:editor@example.com">Mail</a>
              <a href="/tag/politics">Tag</a>
              <a href="/about">About</a>
              <a href="https://elsewhere.org/story">Offsite</a>
              <a href="ftp://blog.example.com/file">FTP</a>
              <a href="/">Home</a>
              <a href="/essays/the-real-one">Real</a>
            </main>
        "##;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(urls(&found), vec!["https://blog.example.com/essays/the-real-one"]);
    }

    #[test]
    fn test_utility_patterns_ignore_host_name() {
        let html = r#"
            <article><a href="/seo-guide">Guide</a></article>
            <article><a href="/tag/seo">Tag</a></article>
        "#;
        for base in ["https://searchengineland.com/", "https://rss.example.org/"] {
            let base = Url::parse(base).unwrap();
            let found = discover(html, &base, 10, &registry()).unwrap();
            assert_eq!(found.len(), 1, "base {base}");
            assert_eq!(found[0].url.path(), "/seo-guide");
        }
    }

    #[test]
    fn test_utility_pattern_in_query_is_skipped() {
        let html = r#"
            <article><a href="/index.php?page=/search/results">Search</a></article>
            <article><a href="/essays/real">Real</a></article>
        "#;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(urls(&found), vec!["https://blog.example.com/essays/real"]);
    }

    #[test]
    fn test_catch_all_requires_two_segments() {
        let html = r#"
            <div>
              <a href="/blog">Blog index</a>
              <a href="/shallow">Shallow</a>
              <a href="/blog/deep-article">Deep</a>
            </div>
        "#;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(urls(&found), vec!["https://blog.example.com/blog/deep-article"]);
    }

    #[test]
    fn test_subdomain_links_accepted() {
        let base = Url::parse("https://example.com/").unwrap();
        let html = r#"<article><a href="https://www.example.com/story">S</a></article>"#;
        let found = discover(html, &base, 10, &registry()).unwrap();
        assert_eq!(urls(&found), vec!["https://www.example.com/story"]);
    }

    #[test]
    fn test_empty_listing_is_empty_result() {
        let err = discover("<html><body><p>Nothing</p></body></html>", &base(), 10, &registry())
            .unwrap_err();
        match err {
            DigestError::EmptyResult { url } => assert_eq!(url, "https://blog.example.com/"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_output_bounded_by_distinct_links() {
        let html = r#"
            <article><a href="/x">X</a></article>
            <article><a href="/x">X</a></article>
            <article><a href="/y">Y</a></article>
        "#;
        let found = discover(html, &base(), 10, &registry()).unwrap();
        assert_eq!(found.len(), 2);
    }
}
