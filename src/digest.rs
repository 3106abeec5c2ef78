//! Digest assembly: per-article summaries, then a headline and combined summary.
//!
//! The assembler makes `N + 1` calls to the Summarization Service for `N`
//! articles: one per article for its summary, then one over all summaries for
//! the headline and the one-sentence combined summary. Any call failing after
//! retries fails the whole digest; there is no partial result.

use crate::api::{AskAsync, SummarizationError};
use crate::config::DigestConfig;
use crate::models::{Article, ArticleSummary, DigestResult};
use crate::utils::{collapse_whitespace, truncate_chars, truncate_words, word_count};
use std::fmt::Write;
use tracing::{debug, info, instrument, warn};

/// Summarize `articles` and assemble them into a [`DigestResult`].
///
/// Summaries keep the order of `articles`.
#[instrument(level = "info", skip_all, fields(articles = articles.len()))]
pub async fn assemble<A>(
    articles: &[Article],
    service: &A,
    config: &DigestConfig,
) -> Result<DigestResult, SummarizationError>
where
    A: AskAsync<Response = String>,
{
    let mut summaries = Vec::with_capacity(articles.len());
    for (i, article) in articles.iter().enumerate() {
        debug!(index = i, title = %article.title, "Summarizing article");
        let prompt = article_prompt(article, config);
        let response = service.ask(&prompt).await?;
        let summary = enforce_word_budget(
            &parse_summary(&response),
            config.max_summary_words,
            config.summary_word_tolerance,
        );
        if summary.is_empty() {
            return Err(SummarizationError::EmptyResponse);
        }
        summaries.push(ArticleSummary {
            title: article.title.clone(),
            author: article.author.clone(),
            summary,
            url: article.source_url.clone(),
        });
    }

    let response = service.ask(&digest_prompt(&summaries)).await?;
    let (headline, combined_summary) = parse_digest(&response)?;
    info!(%headline, summaries = summaries.len(), "Assembled digest");

    Ok(DigestResult {
        headline,
        combined_summary,
        summaries,
    })
}

fn article_prompt(article: &Article, config: &DigestConfig) -> String {
    let author = if article.author.is_empty() {
        "Unknown"
    } else {
        &article.author
    };
    format!(
        "Summarize the following article in a single paragraph of at most {max} words. \
         Present its central argument, not just its topic.\n\n\
         Title: {title}\n\
         Author: {author}\n\
         URL: {url}\n\n\
         Content:\n{body}\n\n\
         Respond with the summary only, on one line starting with \"SUMMARY:\".",
        max = config.max_summary_words,
        title = article.title,
        url = article.source_url,
        body = truncate_chars(&article.body, config.prompt_body_chars),
    )
}

fn digest_prompt(summaries: &[ArticleSummary]) -> String {
    let mut listing = String::new();
    for (i, s) in summaries.iter().enumerate() {
        let _ = writeln!(listing, "{}. {}\n{}\n", i + 1, s.title, s.summary);
    }
    format!(
        "Here are summaries of {n} articles:\n\n{listing}\
         Write:\n\
         1. A compelling, intellectually credible headline that references the most \
         interesting one or two articles. No clickbait.\n\
         2. A single sentence of 20-30 words weaving together the themes of all the articles.\n\n\
         Format your response exactly as:\n\
         HEADLINE: <headline>\n\
         COMBINED_SUMMARY: <sentence>",
        n = summaries.len(),
    )
}

/// Take the text from the `SUMMARY:` label onwards, dropping any preamble
/// before it. Without a label the whole response is the summary.
fn parse_summary(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();
    let labelled = lines.iter().enumerate().find_map(|(i, line)| {
        strip_label(line.trim(), "SUMMARY").map(|rest| (i, rest))
    });
    match labelled {
        Some((i, rest)) => {
            let tail = lines[i + 1..].join(" ");
            collapse_whitespace(&format!("{rest} {tail}"))
        }
        None => collapse_whitespace(response),
    }
}

/// Pull the headline and combined summary out of the digest response.
///
/// Labelled lines are preferred; without labels the first two non-empty lines are used.
fn parse_digest(response: &str) -> Result<(String, String), SummarizationError> {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let labelled = |label: &str| {
        lines
            .iter()
            .find_map(|line| strip_label(line, label))
            .map(collapse_whitespace)
    };

    let headline = labelled("HEADLINE").or_else(|| lines.first().map(|l| unquote(l)));
    let combined = labelled("COMBINED_SUMMARY").or_else(|| lines.get(1).map(|l| unquote(l)));

    match (headline, combined) {
        (Some(h), Some(c)) if !h.is_empty() && !c.is_empty() => Ok((h, c)),
        _ => {
            warn!(response = %response, "Digest response missing headline or combined summary");
            Err(SummarizationError::EmptyResponse)
        }
    }
}

/// Return the text after `label:` if `line` starts with it, ignoring case and
/// Markdown emphasis around the label.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim_start_matches(['*', '_', '#', ' ']);
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches(['*', '_']);
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start_matches(['*', '_']).trim())
}

fn unquote(line: &str) -> String {
    collapse_whitespace(line.trim_matches(['"', '*', '#', ' ']))
}

/// Cut `text` to at most `max` words at a word boundary, without an ellipsis.
///
/// Overshoot within `tolerance` is an expected wobble and only logged at debug.
pub fn enforce_word_budget(text: &str, max: usize, tolerance: usize) -> String {
    let words = word_count(text);
    if words <= max {
        return collapse_whitespace(text);
    }
    if words - max <= tolerance {
        debug!(words, max, "Summary slightly over budget; truncating");
    } else {
        warn!(words, max, "Summary over budget; truncating");
    }
    truncate_words(text, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned responses and records every prompt.
    struct Scripted {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: &[&str]) -> Self {
            let mut responses: Vec<String> = responses.iter().map(|s| s.to_string()).collect();
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl AskAsync for Scripted {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, SummarizationError> {
            self.prompts.lock().unwrap().push(text.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or(SummarizationError::EmptyResponse)
        }
    }

    struct Failing;

    impl AskAsync for Failing {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, SummarizationError> {
            Err(SummarizationError::Exhausted {
                attempts: 3,
                last: Box::new(SummarizationError::RateLimited),
            })
        }
    }

    fn article(title: &str, author: &str) -> Article {
        Article {
            title: title.to_string(),
            author: author.to_string(),
            body: "Body text ".repeat(30),
            source_url: format!("https://example.com/{}", title.to_lowercase()),
        }
    }

    #[tokio::test]
    async fn test_assemble_keeps_order_and_parses() {
        let service = Scripted::new(&[
            "SUMMARY: First summary.",
            "Second summary\nwraps a line.",
            "HEADLINE: Big Ideas\nCOMBINED_SUMMARY: Two essays on things.",
        ]);
        let articles = vec![article("One", "Ann"), article("Two", "")];

        let digest = assemble(&articles, &service, &DigestConfig::default()).await.unwrap();

        assert_eq!(digest.headline, "Big Ideas");
        assert_eq!(digest.combined_summary, "Two essays on things.");
        assert_eq!(digest.summaries.len(), 2);
        assert_eq!(digest.summaries[0].title, "One");
        assert_eq!(digest.summaries[0].summary, "First summary.");
        assert_eq!(digest.summaries[1].summary, "Second summary wraps a line.");
        assert_eq!(digest.summaries[1].author, "");
        assert_eq!(digest.summaries[1].url, "https://example.com/two");

        let prompts = service.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Title: One"));
        assert!(prompts[0].contains("at most 50 words"));
        assert!(prompts[2].contains("1. One\nFirst summary."));
    }

    #[tokio::test]
    async fn test_assemble_enforces_word_budget() {
        let long = (0..120).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let service = Scripted::new(&[long.as_str(), "HEADLINE: H\nCOMBINED_SUMMARY: C"]);
        let config = DigestConfig {
            max_summary_words: 50,
            ..DigestConfig::default()
        };

        let digest = assemble(&[article("One", "Ann")], &service, &config).await.unwrap();

        let summary = &digest.summaries[0].summary;
        assert_eq!(word_count(summary), 50);
        assert!(summary.ends_with("w49"));
        assert!(!summary.contains('…'));
    }

    #[tokio::test]
    async fn test_assemble_failure_is_fatal() {
        let err = assemble(&[article("One", "Ann")], &Failing, &DigestConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizationError::Exhausted { .. }));
    }

    #[test]
    fn test_parse_digest_with_markdown_labels() {
        let (h, c) = parse_digest("**HEADLINE:** Order and Liberty\n\n**COMBINED_SUMMARY:** A sentence.").unwrap();
        assert_eq!(h, "Order and Liberty");
        assert_eq!(c, "A sentence.");
    }

    #[test]
    fn test_parse_digest_without_labels() {
        let (h, c) = parse_digest("\"The Headline\"\nThe combined sentence.").unwrap();
        assert_eq!(h, "The Headline");
        assert_eq!(c, "The combined sentence.");
    }

    #[test]
    fn test_parse_digest_missing_combined() {
        assert!(parse_digest("HEADLINE: Only this").is_err());
    }

    #[test]
    fn test_parse_summary_strips_label() {
        assert_eq!(parse_summary("summary:  Text here "), "Text here");
        assert_eq!(parse_summary("No label"), "No label");
    }

    #[test]
    fn test_parse_summary_drops_preamble() {
        assert_eq!(
            parse_summary("Here is the summary:\n\nSUMMARY: Order precedes liberty."),
            "Order precedes liberty."
        );
        assert_eq!(
            parse_summary("Sure.\n**Summary:** Order precedes\nliberty."),
            "Order precedes liberty."
        );
    }

    #[tokio::test]
    async fn test_preamble_does_not_use_word_budget() {
        let service = Scripted::new(&[
            "Here is a concise summary of the article:\n\nSUMMARY: one two three four five",
            "HEADLINE: H\nCOMBINED_SUMMARY: C",
        ]);
        let config = DigestConfig {
            max_summary_words: 5,
            summary_word_tolerance: 0,
            ..DigestConfig::default()
        };

        let digest = assemble(&[article("One", "Ann")], &service, &config).await.unwrap();
        assert_eq!(digest.summaries[0].summary, "one two three four five");
    }

    #[test]
    fn test_enforce_word_budget() {
        assert_eq!(enforce_word_budget("a b c", 5, 2), "a b c");
        assert_eq!(enforce_word_budget("a b c d e f", 5, 2), "a b c d e");
        assert_eq!(enforce_word_budget("a b c d e f g h i j", 5, 2), "a b c d e");
    }

    #[test]
    fn test_word_budget_holds_for_any_length() {
        for n in [0usize, 1, 49, 50, 51, 55, 56, 500] {
            let text = vec!["x"; n].join(" ");
            assert!(word_count(&enforce_word_budget(&text, 50, 5)) <= 50);
        }
    }
}
