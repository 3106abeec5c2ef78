//! Output rendering and writing.
//!
//! # Submodules
//!
//! - [`markdown`]: Renders a `DigestResult` in the fixed digest layout
//! - [`json`]: Renders a `DigestResult` as JSON
//!
//! A digest is written exactly once, after it has been fully assembled. File
//! destinations receive it through a sibling temporary file that is renamed
//! into place, so the target is either untouched or complete.

pub mod json;
pub mod markdown;

use crate::error::DigestError;
use crate::models::DigestResult;
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

/// Document format of the rendered digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Markdown,
    Json,
}

/// Where the rendered digest goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Console,
    File(PathBuf),
}

impl Destination {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map_or(Destination::Console, Destination::File)
    }
}

/// Render `result` in the requested format.
pub fn render(result: &DigestResult, format: OutputFormat) -> Result<String, DigestError> {
    match format {
        OutputFormat::Markdown => Ok(markdown::digest_to_markdown(result)),
        OutputFormat::Json => json::digest_to_json(result).map_err(|e| DigestError::Output {
            path: "<json>".to_string(),
            source: e.into(),
        }),
    }
}

/// Write `text` verbatim to `destination`, creating or replacing the file.
#[instrument(level = "info", skip_all, fields(destination = ?destination))]
pub async fn write(text: &str, destination: &Destination) -> Result<(), DigestError> {
    match destination {
        Destination::Console => {
            let mut stdout = tokio::io::stdout();
            let result = async {
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await
            }
            .await;
            result.map_err(|source| DigestError::Output {
                path: "<stdout>".to_string(),
                source,
            })
        }
        Destination::File(path) => {
            write_file_atomically(path, text)
                .await
                .map_err(|source| DigestError::Output {
                    path: path.display().to_string(),
                    source,
                })?;
            info!(path = %path.display(), bytes = text.len(), "Wrote digest");
            Ok(())
        }
    }
}

async fn write_file_atomically(path: &Path, text: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "digest".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.partial"));

    if let Err(e) = tokio::fs::write(&tmp, text).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
