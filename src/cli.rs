//! Command-line interface definitions for Article Digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The config path and API key can also come from environment variables.

use crate::config::{API_KEY_ENV, CONFIG_PATH_ENV};
use crate::outputs::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Article Digest application.
///
/// # Examples
///
/// ```sh
/// # Ten articles, Markdown to stdout
/// article_digest https://blog.example.com
///
/// # Five articles written to a file
/// article_digest example.com/essays -n 5 -o digest.md
///
/// # JSON with a custom selector config
/// article_digest https://blog.example.com --format json -c ./digest.yaml
/// ```
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Listing page to collect articles from (https:// is assumed when no scheme is given)
    pub url: String,

    /// Number of articles to include [default: from config, 10]
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: Option<u32>,

    /// Write the digest to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Optional path to a YAML config file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,

    /// Document format of the digest
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Summarization Service API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,
}
