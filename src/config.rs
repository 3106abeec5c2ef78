//! Run configuration.
//!
//! A [`DigestConfig`] is built once at startup from built-in defaults, an
//! optional YAML file and the command line, then passed by reference into
//! every stage. It is never modified afterwards.
//!
//! # Example file
//!
//! ```yaml
//! model: claude-sonnet-4-20250514
//! max_summary_words: 40
//! selectors:
//!   - purpose: link
//!     pattern: ".river-item"
//!     priority: 0
//!   - purpose: title
//!     pattern: "h1"
//!     priority: 0
//!   - purpose: body
//!     pattern: ".story"
//!     priority: 0
//! ```
//!
//! Any field left out keeps its default. A `selectors` list replaces the
//! built-in rule set entirely.

use crate::error::DigestError;
use crate::selectors::{Purpose, SelectorRule};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Environment variable holding the Summarization Service credential.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable naming a YAML config file.
pub const CONFIG_PATH_ENV: &str = "ARTICLE_DIGEST_CONFIG";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_STYLE_PROMPT: &str = r#"You write article summaries for a serious, intellectually demanding digest.

Voice:
- State the article's central argument or thesis, not merely its topic.
- Stay analytical. No therapeutic, self-help or emotional language.
- Tie the argument to the philosophical, theological or ethical principle underneath it.
- Use precise language; every word must earn its place.
- Leave the reader wanting the full piece without hype or clickbait.

Never:
- Open with the author's name, "In this article" or "The author".
- Describe vaguely ("discusses", "explores", "looks at").
- Use promotional phrasing ("a must-read", "brilliant").

Example of the expected register:
"When agencies both write and enforce rules, the separation of powers survives only on paper, leaving citizens under a form of government the Founders deliberately rejected.""#;

/// Immutable settings for one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Model identifier sent to the Summarization Service.
    pub model: String,
    /// Base URL of the Summarization Service.
    pub api_base: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// Completion budget for each request.
    pub max_tokens: u32,
    /// Articles per digest when `--count` is not given.
    pub default_article_count: usize,
    /// Listing candidates considered per requested article.
    pub candidate_multiplier: usize,
    pub max_summary_words: usize,
    /// Overshoot that is truncated quietly; larger overshoot is logged as a warning.
    pub summary_word_tolerance: usize,
    /// Bodies shorter than this are skipped.
    pub min_body_chars: usize,
    /// A body rule must yield more than this to win outright.
    pub preferred_body_chars: usize,
    /// Title candidates this long or longer are passed over for the next rule.
    pub max_title_chars: usize,
    pub max_author_chars: usize,
    pub max_body_chars: usize,
    /// Body characters included in each summarization prompt.
    pub prompt_body_chars: usize,
    /// Page fetch timeout.
    pub request_timeout_secs: u64,
    /// Timeout for one Summarization Service call.
    pub summarize_timeout_secs: u64,
    pub fetch_retries: usize,
    pub fetch_retry_delay_ms: u64,
    pub politeness_delay_ms: u64,
    pub summarize_attempts: usize,
    pub summarize_base_delay_ms: u64,
    pub summarize_max_delay_ms: u64,
    pub user_agent: String,
    /// System prompt describing the editorial voice.
    pub style_prompt: String,
    pub selectors: Vec<SelectorRule>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            api_base: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 1024,
            default_article_count: 10,
            candidate_multiplier: 2,
            max_summary_words: 50,
            summary_word_tolerance: 5,
            min_body_chars: 100,
            preferred_body_chars: 200,
            max_title_chars: 300,
            max_author_chars: 100,
            max_body_chars: 10_000,
            prompt_body_chars: 5_000,
            request_timeout_secs: 30,
            summarize_timeout_secs: 60,
            fetch_retries: 3,
            fetch_retry_delay_ms: 2_000,
            politeness_delay_ms: 500,
            summarize_attempts: 3,
            summarize_base_delay_ms: 1_000,
            summarize_max_delay_ms: 30_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            style_prompt: DEFAULT_STYLE_PROMPT.to_string(),
            selectors: SelectorRule::defaults(),
        }
    }
}

impl DigestConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn summarize_timeout(&self) -> Duration {
        Duration::from_secs(self.summarize_timeout_secs)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_delay_ms)
    }

    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }

    pub fn summarize_base_delay(&self) -> Duration {
        Duration::from_millis(self.summarize_base_delay_ms)
    }

    pub fn summarize_max_delay(&self) -> Duration {
        Duration::from_millis(self.summarize_max_delay_ms)
    }

    /// Parse a config from YAML text, filling gaps with defaults.
    pub fn from_yaml(text: &str) -> Result<Self, DigestError> {
        // An empty file deserializes to `null`, which is not a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: DigestConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that would otherwise fail deep inside a run.
    ///
    /// Selector patterns are checked when the registry is built.
    pub fn validate(&self) -> Result<(), DigestError> {
        if self.model.trim().is_empty() {
            return Err(DigestError::Configuration("model must not be empty".into()));
        }
        if self.max_summary_words == 0 {
            return Err(DigestError::Configuration(
                "max_summary_words must be at least 1".into(),
            ));
        }
        if self.default_article_count == 0 {
            return Err(DigestError::Configuration(
                "default_article_count must be at least 1".into(),
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(DigestError::Configuration(
                "candidate_multiplier must be at least 1".into(),
            ));
        }
        if self.fetch_retries == 0 || self.summarize_attempts == 0 {
            return Err(DigestError::Configuration(
                "fetch_retries and summarize_attempts must be at least 1".into(),
            ));
        }
        for purpose in [Purpose::Link, Purpose::Title, Purpose::Body] {
            if !self.selectors.iter().any(|r| r.purpose == purpose) {
                return Err(DigestError::Configuration(format!(
                    "no selector rule for purpose `{purpose}`"
                )));
            }
        }
        Ok(())
    }
}

/// Load the configuration from `path`, or return the defaults when no path is given.
///
/// # Errors
///
/// Returns [`DigestError::Configuration`] if the file cannot be read, is not
/// valid YAML for [`DigestConfig`], or fails validation.
#[instrument(level = "debug")]
pub fn load_config(path: Option<&Path>) -> Result<DigestConfig, DigestError> {
    let Some(path) = path else {
        debug!("No config file given; using defaults");
        return Ok(DigestConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|e| {
        DigestError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    let config = DigestConfig::from_yaml(&text)?;
    info!(path = %path.display(), rules = config.selectors.len(), "Loaded configuration");
    Ok(config)
}

/// Read the Summarization Service credential.
///
/// A missing or blank key is fatal before any network activity.
pub fn require_api_key(key: Option<&str>) -> Result<String, DigestError> {
    match key.map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k.to_string()),
        _ => Err(DigestError::Configuration(format!(
            "{API_KEY_ENV} is not set; export it or add it to a .env file"
        ))),
    }
}
