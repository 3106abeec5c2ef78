//! Summarization Service client with exponential backoff retry logic.
//!
//! This module talks to an Anthropic-compatible Messages API. It includes
//! automatic retry logic with exponential backoff and jitter for the failures
//! that are worth retrying (rate limits, timeouts, overloaded servers).
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`MessagesClient`]: Sends one prompt to the Messages API
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - 3 attempts in total by default
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - Only transient errors are retried; anything else fails immediately

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Failures reported by the Summarization Service.
#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("rate limited by the summarization service")]
    RateLimited,
    #[error("summarization request timed out")]
    Timeout,
    #[error("summarization service unavailable (HTTP {status}): {body}")]
    Server { status: StatusCode, body: String },
    #[error("summarization service rejected the request (HTTP {status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("summarization request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("could not decode summarization response: {0}")]
    Decode(String),
    #[error("summarization service returned no usable text")]
    EmptyResponse,
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<SummarizationError>,
    },
}

impl SummarizationError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SummarizationError::RateLimited
            | SummarizationError::Timeout
            | SummarizationError::Server { .. } => true,
            SummarizationError::Request(e) => e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        let body = truncate_for_log(&body, 300);
        match status.as_u16() {
            429 => SummarizationError::RateLimited,
            408 | 504 => SummarizationError::Timeout,
            // 529: overloaded
            500..=599 => SummarizationError::Server { status, body },
            _ => SummarizationError::Api { status, body },
        }
    }
}

impl From<reqwest::Error> for SummarizationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummarizationError::Timeout
        } else if e.is_decode() {
            SummarizationError::Decode(e.to_string())
        } else {
            SummarizationError::Request(e)
        }
    }
}

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, SummarizationError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Total attempts, including the first.
    max_attempts: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
    max_jitter: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = MessagesClient::new(&config, api_key)?;
    /// let retry_client = RetryAsk::new(client, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_attempts: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[cfg(test)]
    pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, SummarizationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_transient() => {
                    error!(attempt, error = %e, "ask() failed with a permanent error");
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "ask() exhausted retries"
                    );
                    return Err(SummarizationError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Client for the Messages endpoint of the Summarization Service.
///
/// Every request carries the configured editorial style as its system prompt.
pub struct MessagesClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    model: String,
    max_tokens: u32,
    system: String,
}

impl fmt::Debug for MessagesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagesClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl MessagesClient {
    pub fn new(config: &DigestConfig, api_key: String) -> Result<Self, DigestError> {
        let client = Client::builder()
            .timeout(config.summarize_timeout())
            .build()
            .map_err(|e| DigestError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", config.api_base.trim_end_matches('/')),
            api_key,
            api_version: config.api_version.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system: config.style_prompt.clone(),
        })
    }
}

impl AskAsync for MessagesClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, SummarizationError> {
        let t0 = Instant::now();
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &self.system,
            messages: [Message {
                role: "user",
                content: text,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let e = SummarizationError::from_status(status, body);
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
            return Err(e);
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = text.len(),
            "API call succeeded"
        );
        if text.trim().is_empty() {
            return Err(SummarizationError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Build the retrying Summarization Service client used by a run.
pub fn summarization_service(
    config: &DigestConfig,
    api_key: String,
) -> Result<RetryAsk<MessagesClient>, DigestError> {
    let client = MessagesClient::new(config, api_key)?;
    Ok(RetryAsk::new(client, config.summarize_attempts, config.summarize_base_delay())
        .with_max_delay(config.summarize_max_delay()))
}
