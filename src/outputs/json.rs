//! JSON rendering of a digest.
//!
//! The document is the pretty-printed serde form of [`DigestResult`], so each
//! summary also carries the URL it was produced from.

use crate::models::DigestResult;

/// Serialize a [`DigestResult`] to pretty-printed JSON with a trailing newline.
pub fn digest_to_json(result: &DigestResult) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string_pretty(result)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleSummary;

    #[test]
    fn test_digest_to_json_round_trips() {
        let result = DigestResult {
            headline: "H".to_string(),
            combined_summary: "C".to_string(),
            summaries: vec![ArticleSummary {
                title: "T".to_string(),
                author: "A".to_string(),
                summary: "S".to_string(),
                url: "https://example.com/t".to_string(),
            }],
        };

        let json = digest_to_json(&result).unwrap();
        assert!(json.ends_with('\n'));
        let parsed: DigestResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
