//! Text helpers and output pre-flight checks.
//!
//! This module provides helper functions used throughout the application:
//! - Whitespace collapsing and char-safe truncation for extracted text
//! - Word counting and word-boundary truncation for summaries
//! - String truncation for logging
//! - File system validation for the output destination

use std::io;
use std::path::Path;
use tracing::{debug, instrument};

/// Collapse every run of whitespace to a single space and trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Number of whitespace-separated words in `s`.
pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Keep the first `max` words of `s`, joined by single spaces.
///
/// No ellipsis is appended.
pub fn truncate_words(s: &str, max: usize) -> String {
    s.split_whitespace().take(max).collect::<Vec<_>>().join(" ")
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte count
/// indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let kept = truncate_chars(s, max);
    if kept.len() == s.len() {
        kept
    } else {
        format!("{}…(+{} bytes)", kept, s.len() - kept.len())
    }
}

/// Ensure the directory that will receive `path` exists and is writable.
///
/// Performs a write test by creating and immediately deleting a probe file
/// next to the destination. Nothing is left behind on success or failure.
///
/// # Errors
///
/// Returns an error if the parent directory does not exist or is not writable.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let meta = tokio::fs::metadata(parent).await?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", parent.display()),
        ));
    }

    let probe = parent.join(".article_digest_probe");
    tokio::fs::File::create(&probe).await?;
    let _ = tokio::fs::remove_file(&probe).await;
    debug!(dir = %parent.display(), "Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b   c "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("one two  three\nfour"), 4);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("a b c d e", 3), "a b c");
        assert_eq!(truncate_words("a  b", 5), "a b");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[tokio::test]
    async fn test_ensure_writable_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("digest.md");
        ensure_writable_parent(&target).await.unwrap();
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_writable_parent_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nope").join("digest.md");
        assert!(ensure_writable_parent(&target).await.is_err());
    }
}
