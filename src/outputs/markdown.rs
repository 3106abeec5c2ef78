//! Markdown rendering of a digest.
//!
//! The layout is fixed and byte-exact:
//!
//! ```text
//! <headline>
//!
//! <combined summary>
//!
//! Articles
//!
//! 1. **<title>**
//! *<author>*
//! <summary>
//!
//! 2. **<title>**
//! ...
//! ```
//!
//! The author line is left out when the author is empty.

use crate::models::DigestResult;

/// Render a [`DigestResult`] as the digest Markdown document.
pub fn digest_to_markdown(result: &DigestResult) -> String {
    let mut lines: Vec<String> = vec![
        result.headline.clone(),
        String::new(),
        result.combined_summary.clone(),
        String::new(),
        "Articles".to_string(),
        String::new(),
    ];

    for (i, entry) in result.summaries.iter().enumerate() {
        lines.push(format!("{}. **{}**", i + 1, entry.title));
        if !entry.author.is_empty() {
            lines.push(format!("*{}*", entry.author));
        }
        lines.push(entry.summary.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}
