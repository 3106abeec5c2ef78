//! Title, author and body extraction from a single article page.
//!
//! All three are located through the [`SelectorRegistry`]. A page without a
//! title, or whose body is shorter than `min_body_chars`, is reported as a
//! [`SkipReason`] so the caller can drop it and carry on.

use crate::config::DigestConfig;
use crate::error::SkipReason;
use crate::models::Article;
use crate::selectors::{Purpose, SelectorRegistry, element_text};
use crate::utils::{collapse_whitespace, truncate_chars};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

/// Bylines longer than this get cut at the first name separator.
const LONG_AUTHOR_CHARS: usize = 60;

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));

static FALLBACK_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", ".post"]
        .iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
});

static AUTHOR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(written by|by|author:)\s+").expect("static regex"));

/// Byline boilerplate, longest phrases first so "About the Authors" wins over "About".
static AUTHOR_NOISE: Lazy<Regex> = Lazy::new(|| {
    let mut phrases = vec![
        "About the Authors",
        "About the Author",
        "About",
        "Follow on Twitter",
        "Follow on X",
        "Follow",
        "Subscribe",
        "Share",
        "Twitter",
        "Facebook",
        "LinkedIn",
        "Email",
        "More articles",
        "View all posts",
        "Read more",
        "Contact",
        " | ",
        " - ",
    ];
    phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
    let alternation = phrases
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}")).expect("static regex")
});

/// Extract an [`Article`] from one page's markup.
///
/// Extraction is a pure function of its inputs: the same markup always
/// yields the same article.
///
/// # Errors
///
/// - [`SkipReason::MissingTitle`] if no title rule yields usable text
/// - [`SkipReason::BodyTooShort`] if the best body is under `min_body_chars`
#[instrument(level = "debug", skip_all, fields(%source_url))]
pub fn extract(
    article_html: &str,
    source_url: &str,
    registry: &SelectorRegistry,
    config: &DigestConfig,
) -> Result<Article, SkipReason> {
    let document = Html::parse_document(article_html);

    let title = registry
        .resolve_with(Purpose::Title, &document, |_, element| {
            let text = element_text(element);
            // Longer text is navigation or a whole teaser, not a headline.
            (!text.is_empty() && text.chars().count() < config.max_title_chars).then_some(text)
        })
        .ok_or(SkipReason::MissingTitle)?;

    let author = registry
        .resolve_with(Purpose::Author, &document, |_, element| {
            let author = clean_author_name(&element_text(element));
            (!author.is_empty() && author.chars().count() < config.max_author_chars).then_some(author)
        })
        .unwrap_or_default();

    let body = extract_body(&document, registry, config);
    let len = body.chars().count();
    if len < config.min_body_chars {
        debug!(len, min = config.min_body_chars, "Body below minimum length");
        return Err(SkipReason::BodyTooShort {
            len,
            min: config.min_body_chars,
        });
    }

    Ok(Article {
        title,
        author,
        body: truncate_chars(&body, config.max_body_chars),
        source_url: source_url.to_string(),
    })
}

/// Pick the body text.
///
/// The first body rule producing more than `preferred_body_chars` wins. Failing
/// that, paragraphs of the first `article`/`main`/`.post` are tried, and the
/// longest text seen along the way is kept.
fn extract_body(document: &Html, registry: &SelectorRegistry, config: &DigestConfig) -> String {
    let mut best = String::new();

    let preferred = registry.resolve_with(Purpose::Body, document, |_, element| {
        let text = container_text(element);
        if text.chars().count() > config.preferred_body_chars {
            return Some(text);
        }
        if text.chars().count() > best.chars().count() {
            best = text;
        }
        None
    });
    if let Some(body) = preferred {
        return body;
    }

    let fallback = FALLBACK_CONTAINERS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .map(paragraph_text)
        .unwrap_or_default();
    if fallback.chars().count() > best.chars().count() {
        best = fallback;
    }
    best
}

/// Paragraph text of a body container, or all of its text if it has no paragraphs.
fn container_text(element: ElementRef<'_>) -> String {
    if element.select(&PARAGRAPH).next().is_some() {
        paragraph_text(element)
    } else {
        element_text(element)
    }
}

fn paragraph_text(element: ElementRef<'_>) -> String {
    element
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip byline prefixes and social/navigation boilerplate from an author string.
pub fn clean_author_name(raw: &str) -> String {
    let without_prefix = AUTHOR_PREFIX.replace_all(raw, "");
    let without_noise = AUTHOR_NOISE.replace_all(&without_prefix, " ");
    let mut author = collapse_whitespace(&without_noise);

    if author.chars().count() > LONG_AUTHOR_CHARS {
        for sep in [",", " and ", " & ", "."] {
            if let Some((head, _)) = author.split_once(sep) {
                let head = head.trim();
                if !head.is_empty() && head.chars().count() < 50 {
                    author = head.to_string();
                    break;
                }
            }
        }
    }

    author
        .trim_matches(|c: char| ".,;:-|/\\\"'".contains(c) || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::SelectorRule;

    fn registry() -> SelectorRegistry {
        SelectorRegistry::new(&SelectorRule::defaults()).unwrap()
    }

    fn long_paragraph(words: usize) -> String {
        (0..words).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    fn page(body: &str) -> String {
        format!(
            r#"<html><head><title>Site</title></head><body>
               <nav><a href="/">Home</a></nav>
               <article>
                 <h1 class="entry-title">  The Shape of
                   Things </h1>
                 <span class="byline">By Jane Roe | Follow on X</span>
                 <div class="entry-content">{body}</div>
               </article>
               <footer>Copyright</footer>
               </body></html>"#
        )
    }

    #[test]
    fn test_extracts_title_author_body() {
        let html = page(&format!("<p>{}</p><p>Second paragraph.</p>", long_paragraph(60)));
        let article = extract(&html, "https://example.com/a", &registry(), &DigestConfig::default()).unwrap();

        assert_eq!(article.title, "The Shape of Things");
        assert_eq!(article.author, "Jane Roe");
        assert!(article.body.starts_with("word0 word1"));
        assert!(article.body.ends_with("Second paragraph."));
        assert_eq!(article.source_url, "https://example.com/a");
    }

    #[test]
    fn test_missing_title_is_skipped() {
        let html = format!("<div class='entry-content'><p>{}</p></div>", long_paragraph(60));
        let err = extract(&html, "https://example.com/a", &registry(), &DigestConfig::default()).unwrap_err();
        assert!(matches!(err, SkipReason::MissingTitle));
    }

    #[test]
    fn test_short_body_is_skipped() {
        let html = page("<p>Too short.</p>");
        let err = extract(&html, "https://example.com/a", &registry(), &DigestConfig::default()).unwrap_err();
        assert!(matches!(err, SkipReason::BodyTooShort { min: 100, .. }));
    }

    #[test]
    fn test_missing_author_is_empty() {
        let html = format!(
            "<h1>Title</h1><div class='post-content'><p>{}</p></div>",
            long_paragraph(60)
        );
        let article = extract(&html, "u", &registry(), &DigestConfig::default()).unwrap();
        assert_eq!(article.author, "");
    }

    #[test]
    fn test_fallback_paragraph_sweep() {
        let html = format!(
            "<h1>Title</h1><main><div><p>{}</p></div><p>{}</p></main>",
            long_paragraph(20),
            long_paragraph(20)
        );
        let article = extract(&html, "u", &registry(), &DigestConfig::default()).unwrap();
        assert!(article.body.chars().count() >= 100);
    }

    #[test]
    fn test_overlong_title_falls_through_to_next_rule() {
        let teaser = "word ".repeat(80);
        let html = format!(
            "<h1 class='entry-title'>{teaser}</h1><article><h1>Real Title</h1>\
             <div class='entry-content'><p>{}</p></div></article>",
            long_paragraph(60)
        );
        let article = extract(&html, "u", &registry(), &DigestConfig::default()).unwrap();
        assert_eq!(article.title, "Real Title");
    }

    #[test]
    fn test_title_limit_comes_from_config() {
        let config = DigestConfig {
            max_title_chars: 10,
            ..DigestConfig::default()
        };
        let html = page(&format!("<p>{}</p>", long_paragraph(60)));
        let err = extract(&html, "u", &registry(), &config).unwrap_err();
        assert!(matches!(err, SkipReason::MissingTitle));
    }

    #[test]
    fn test_body_truncated_to_limit() {
        let config = DigestConfig {
            max_body_chars: 150,
            ..DigestConfig::default()
        };
        let html = page(&format!("<p>{}</p>", long_paragraph(200)));
        let article = extract(&html, "u", &registry(), &config).unwrap();
        assert_eq!(article.body.chars().count(), 150);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = page(&format!("<p>{}</p>", long_paragraph(80)));
        let first = extract(&html, "u", &registry(), &DigestConfig::default()).unwrap();
        let second = extract(&html, "u", &registry(), &DigestConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clean_author_name() {
        assert_eq!(clean_author_name("By John Smith"), "John Smith");
        assert_eq!(clean_author_name("Written by Ann Lee - Twitter"), "Ann Lee");
        assert_eq!(clean_author_name("About the Author Mary Poe"), "Mary Poe");
        assert_eq!(clean_author_name("  Author: Sam  "), "Sam");
        assert_eq!(
            clean_author_name(
                "Alexandra Montgomery-Whitfield, Senior Fellow at the Institute for Studies"
            ),
            "Alexandra Montgomery-Whitfield"
        );
    }
}
