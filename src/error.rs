//! Error taxonomy for a digest run.
//!
//! Errors are split by how far they reach:
//! - [`SkipReason`]: one article is dropped, the run carries on
//! - [`DigestError`]: the run stops and the process exits non-zero
//!
//! [`FetchError`] and [`SummarizationError`] belong to the collaborators that
//! raise them and are wrapped by one of the two above.

use thiserror::Error;

pub use crate::api::SummarizationError;
pub use crate::fetcher::FetchError;

/// Why a single article was left out of the digest.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("article page could not be fetched: {0}")]
    Fetch(#[from] FetchError),
    #[error("no title found")]
    MissingTitle,
    #[error("body too short ({len} chars, need {min})")]
    BodyTooShort { len: usize, min: usize },
}

/// A failure that ends the run.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no article links found on {url}; the website structure may not be supported")]
    EmptyResult { url: String },
    #[error("summarization failed: {0}")]
    Summarization(#[from] SummarizationError),
    #[error("failed to write output to {path}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DigestError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DigestError::Configuration(_) | DigestError::InvalidUrl { .. } => 2,
            _ => 1,
        }
    }
}

impl From<serde_yaml::Error> for DigestError {
    fn from(e: serde_yaml::Error) -> Self {
        DigestError::Configuration(e.to_string())
    }
}
