//! Resilient HTTP fetch primitive
//!
//! Performs a GET request with content-type-aware decoding and exponential
//! backoff. AEMET advertises its charset inconsistently, so every body is
//! decoded as UTF-8 first and re-decoded as ISO-8859-1 when UTF-8 decoding
//! produces replacement characters. Bodies declared as JSON must then parse;
//! anything else is sniffed for JSON and kept as text otherwise.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 5;

/// Default wait before the first retry; doubled after every failed attempt
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1000);

/// Errors that can occur when talking to AEMET
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// HTTP 429 from the server
    #[error("AEMET rate limit exceeded (429)")]
    RateLimited,

    /// Any other non-2xx status
    #[error("AEMET server error: {0}")]
    Server(u16),

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Network(Arc<reqwest::Error>),

    /// The metadata envelope reported a non-200 status
    #[error("AEMET returned an error: {0}")]
    Upstream(String),

    /// The payload could not be decoded into the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The configured API key cannot be sent as a header value
    #[error("API key contains characters that are not valid in an HTTP header")]
    InvalidApiKey,

    /// The overall deadline for a logical fetch elapsed
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(Arc::new(e))
    }
}

impl FetchError {
    /// Whether the fetch primitive should retry after this error.
    ///
    /// Logical errors reported by AEMET itself and local configuration
    /// problems will not go away by asking again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Upstream(_) | FetchError::InvalidApiKey)
    }
}

/// A decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Body parsed as JSON
    Json(Value),
    /// Body that is not JSON, decoded to text
    Text(String),
}

impl Payload {
    /// Deserializes a JSON payload into `T`.
    ///
    /// Text payloads already failed the JSON sniffing step during decoding,
    /// so they are reported as a decode error.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, FetchError> {
        match self {
            Payload::Json(value) => {
                serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
            }
            Payload::Text(text) => Err(FetchError::Decode(format!(
                "expected a JSON document, got text starting with {:?}",
                text.chars().take(40).collect::<String>()
            ))),
        }
    }
}

/// Retry budget and backoff schedule for the fetch primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub retries: u32,
    /// Wait before the first retry
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            initial_backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Runs `attempt` until it succeeds or the retry budget is exhausted.
///
/// Waits `initial_backoff` before the first retry and doubles the wait
/// every time. With `retries = N` an always-failing operation runs exactly
/// `N + 1` times and the last error is returned. Non-retryable errors are
/// returned immediately.
///
/// The waits are tokio sleeps, so dropping the returned future aborts a
/// pending backoff.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retries = policy.retries;
    let mut backoff = policy.initial_backoff;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if retries > 0 && e.is_retryable() => {
                warn!(
                    "request failed ({}), retrying in {:?} ({} retries left)",
                    e, backoff, retries
                );
                tokio::time::sleep(backoff).await;
                retries -= 1;
                backoff = backoff.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// HTTP client wrapper implementing the retrying, charset-tolerant GET
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Creates a fetcher with the default retry policy
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            policy: RetryPolicy::default(),
        }
    }

    /// Creates a fetcher with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The retry policy in use
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches `url` with the given headers, retrying per the policy
    ///
    /// # Returns
    /// * `Ok(Payload)` - The decoded body
    /// * `Err(FetchError)` - The last error once the retry budget is spent
    pub async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<Payload, FetchError> {
        retry_with_backoff(self.policy, || self.fetch_once(url, headers.clone())).await
    }

    /// Performs a single request without retrying
    async fn fetch_once(&self, url: &str, headers: HeaderMap) -> Result<Payload, FetchError> {
        let response = self.client.get(url).headers(headers).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Server(status.as_u16()));
        }

        let declares_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        let bytes = response.bytes().await?;
        if declares_json {
            return decode_json(&bytes);
        }
        Ok(decode_body(&bytes))
    }
}

/// Decodes a body declared as JSON, whatever charset it was sent in
pub fn decode_json(bytes: &[u8]) -> Result<Payload, FetchError> {
    serde_json::from_str(decode_text(bytes).trim())
        .map(Payload::Json)
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// Decodes a raw body into text and sniffs it for JSON
pub fn decode_body(bytes: &[u8]) -> Payload {
    parse_text_payload(decode_text(bytes))
}

/// Decodes bytes as UTF-8, falling back to ISO-8859-1 on replacement characters
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.contains(char::REPLACEMENT_CHARACTER) {
        decode_latin1(bytes)
    } else {
        text.into_owned()
    }
}

/// Printable characters windows-1252 places in 0x80..=0x9F
///
/// Bytes it leaves undefined keep their C1 control code point.
const WINDOWS_1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Decodes ISO-8859-1 the way browsers label it, i.e. as windows-1252
///
/// Outside 0x80..=0x9F every byte maps to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
            _ => char::from(b),
        })
        .collect()
}

/// Parses text that looks like a JSON array or object, keeping the text otherwise
fn parse_text_payload(text: String) -> Payload {
    let trimmed = text.trim();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return Payload::Json(value);
        }
    }
    Payload::Text(text)
}
