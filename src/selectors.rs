//! Selector registry: ordered CSS rules for locating links, titles, authors and bodies.
//!
//! Every piece of data the scraper pulls out of a page is found by trying a
//! list of CSS selectors in ascending priority until one produces something
//! usable. The rules are plain configuration; the registry compiles them once
//! and is read-only afterwards.
//!
//! # Default rules
//!
//! | Purpose | First tried | Last resort |
//! |---------|-------------|-------------|
//! | `link` | listing cards (`.post-card`, ...) | any `a[href]` two path segments deep |
//! | `title` | `h1.entry-title` | `h1` |
//! | `author` | `.author-name` | `[class*='author']` |
//! | `body` | `.blog-content__copy` | `article` |

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, trace};

/// Subtrees whose text never belongs to an article.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// What a selector rule is used to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Link,
    Title,
    Author,
    Body,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Purpose::Link => "link",
            Purpose::Title => "title",
            Purpose::Author => "author",
            Purpose::Body => "body",
        };
        f.write_str(name)
    }
}

/// A single extraction rule as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectorRule {
    pub purpose: Purpose,
    /// CSS selector.
    pub pattern: String,
    /// Lower values are tried first.
    pub priority: i32,
    /// Link rules only: minimum number of non-empty path segments an accepted URL must have.
    #[serde(default)]
    pub min_path_segments: usize,
}

impl SelectorRule {
    pub fn new(purpose: Purpose, pattern: &str, priority: i32) -> Self {
        Self {
            purpose,
            pattern: pattern.to_string(),
            priority,
            min_path_segments: 0,
        }
    }

    /// The built-in rule set, covering common blog and news layouts.
    pub fn defaults() -> Vec<SelectorRule> {
        let link = [
            ".section--listing--card",
            ".post-card",
            ".article-card",
            ".entry-card",
            ".blog-card",
            "[class*='blog-card']",
            "[class*='post-card']",
            "[class*='article-card']",
            "[class*='card']",
            "article",
            ".post",
            ".entry",
            ".blog-post",
            ".article-item",
            "[class*='post']",
            "[class*='article']",
            "main a[href]",
            ".content a[href]",
            ".posts a[href]",
            ".blog a[href]",
            ".articles a[href]",
        ];
        let title = [
            "h1.entry-title",
            "h1.post-title",
            "h1.article-title",
            "article h1",
            ".post h1",
            "main h1",
            "h1",
        ];
        let author = [
            ".author-name",
            ".post-author",
            ".entry-author",
            ".byline",
            "[rel='author']",
            ".author",
            "[class*='author']",
        ];
        let body = [
            ".blog-content__copy",
            ".w-richtext",
            ".entry-content",
            ".post-content",
            ".article-content",
            ".post-body",
            ".blog-post-content",
            ".article-body",
            ".story-content",
            ".post__content",
            ".content-body",
            "article .content",
            "[class*='post-content']",
            "[class*='article-content']",
            "[class*='entry-content']",
            "[class*='blog-content']",
            "article",
        ];

        let mut rules = Vec::new();
        for (purpose, patterns) in [
            (Purpose::Link, &link[..]),
            (Purpose::Title, &title[..]),
            (Purpose::Author, &author[..]),
            (Purpose::Body, &body[..]),
        ] {
            for (i, pattern) in patterns.iter().enumerate() {
                rules.push(SelectorRule::new(purpose, pattern, (i as i32) * 10));
            }
        }

        // Catch-all: any anchor on the page that looks like /section/slug.
        let mut any_anchor = SelectorRule::new(Purpose::Link, "a[href]", link.len() as i32 * 10);
        any_anchor.min_path_segments = 2;
        rules.push(any_anchor);

        rules
    }
}

#[derive(Debug)]
struct CompiledRule {
    rule: SelectorRule,
    selector: Selector,
}

/// Compiled, priority-ordered selector rules.
#[derive(Debug)]
pub struct SelectorRegistry {
    rules: Vec<CompiledRule>,
}

impl SelectorRegistry {
    /// Compile `rules`, ordering them by ascending priority.
    ///
    /// Rules with equal priority keep their configured order.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Configuration`] if any pattern is not a valid CSS selector.
    pub fn new(rules: &[SelectorRule]) -> Result<Self, DigestError> {
        let mut compiled = rules
            .iter()
            .map(|rule| {
                Selector::parse(&rule.pattern)
                    .map(|selector| CompiledRule {
                        rule: rule.clone(),
                        selector,
                    })
                    .map_err(|e| {
                        DigestError::Configuration(format!(
                            "invalid {} selector `{}`: {e}",
                            rule.purpose, rule.pattern
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        compiled.sort_by_key(|c| c.rule.priority);
        Ok(Self { rules: compiled })
    }

    pub fn from_config(config: &DigestConfig) -> Result<Self, DigestError> {
        let registry = Self::new(&config.selectors)?;
        debug!(
            link = registry.rules_for(Purpose::Link).count(),
            title = registry.rules_for(Purpose::Title).count(),
            author = registry.rules_for(Purpose::Author).count(),
            body = registry.rules_for(Purpose::Body).count(),
            "Compiled selector rules"
        );
        Ok(registry)
    }

    /// Rules for `purpose` in the order they are tried.
    pub fn rules_for(&self, purpose: Purpose) -> impl Iterator<Item = &SelectorRule> {
        self.compiled_for(purpose).map(|c| &c.rule)
    }

    fn compiled_for(&self, purpose: Purpose) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |c| c.rule.purpose == purpose)
    }

    /// Return the first value `f` produces, trying every match of every rule in order.
    pub fn resolve_with<'a, T, F>(&self, purpose: Purpose, doc: &'a Html, mut f: F) -> Option<T>
    where
        F: FnMut(&SelectorRule, ElementRef<'a>) -> Option<T>,
    {
        for compiled in self.compiled_for(purpose) {
            for element in doc.select(&compiled.selector) {
                if let Some(value) = f(&compiled.rule, element) {
                    trace!(%purpose, pattern = %compiled.rule.pattern, "Selector rule matched");
                    return Some(value);
                }
            }
        }
        None
    }

    /// Return everything `f` produces for the first rule that produces anything.
    ///
    /// Used where one rule yields a sequence, such as the links on a listing page.
    pub fn resolve_all<'a, T, F>(&self, purpose: Purpose, doc: &'a Html, mut f: F) -> Vec<T>
    where
        F: FnMut(&SelectorRule, ElementRef<'a>) -> Option<T>,
    {
        for compiled in self.compiled_for(purpose) {
            let values: Vec<T> = doc
                .select(&compiled.selector)
                .filter_map(|element| f(&compiled.rule, element))
                .collect();
            if !values.is_empty() {
                trace!(%purpose, pattern = %compiled.rule.pattern, count = values.len(), "Selector rule matched");
                return values;
            }
        }
        Vec::new()
    }
}

/// Visible text of `element` with whitespace collapsed.
///
/// Text inside script, style and page chrome (`nav`, `header`, `footer`) is left out.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !SKIPPED_ELEMENTS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}
