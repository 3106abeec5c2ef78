//! # Article Digest
//!
//! Scrapes the article links from a blog or publication listing page,
//! extracts each article's title, author and body, summarizes every article
//! through an LLM, and writes a single digest with a headline, a combined
//! summary and one entry per article.
//!
//! ## Usage
//!
//! ```sh
//! article_digest https://blog.example.com -n 5 -o digest.md
//! ```
//!
//! ## Architecture
//!
//! The application runs one strictly sequential pipeline:
//! 1. **Discovery**: Find article links on the listing page
//! 2. **Extraction**: Fetch each article and pull out title, author and body
//! 3. **Summarization**: One LLM call per article, then one for the headline
//! 4. **Output**: Render Markdown or JSON and write it once, at the end

use clap::Parser;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod digest;
mod error;
mod extract;
mod fetcher;
mod links;
mod models;
mod outputs;
mod pipeline;
mod selectors;
mod utils;

use cli::Cli;
use config::{load_config, require_api_key};
use error::DigestError;
use fetcher::Fetcher;
use outputs::Destination;
use pipeline::{Pipeline, RunOptions};
use selectors::SelectorRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    let args = Cli::parse();

    // --- Tracing init ---
    let default_filter = if args.verbose {
        "article_digest=debug,warn"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if args.verbose {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: &Cli) -> Result<(), DigestError> {
    info!(version = env!("CARGO_PKG_VERSION"), "article_digest starting up");

    let config = load_config(args.config.as_deref())?;
    let registry = SelectorRegistry::from_config(&config)?;
    let api_key = require_api_key(args.api_key.as_deref())?;
    let fetcher = Fetcher::new(&config)?;
    let service = api::summarization_service(&config, api_key)?;

    let options = RunOptions {
        url: args.url.clone(),
        count: args
            .count
            .map_or(config.default_article_count, |n| n as usize),
        destination: Destination::from_path(args.output.clone()),
        format: args.format,
    };
    debug!(?options, "Resolved run options");

    let pipeline = Pipeline {
        config: &config,
        registry: &registry,
        fetcher: &fetcher,
        service: &service,
    };
    pipeline.run(&options).await
}
