//! # Spotify Integration Module
//!
//! Client for the parts of the Spotify Web API MySpotBackup needs, plus the
//! accounts service token calls in [`auth`].
//!
//! ## Request pipeline
//!
//! Every call made through [`SpotifyClient::request`] goes through the same
//! steps:
//!
//! ```text
//! bearer token header
//!        ↓
//! send ──→ 429? ──→ wait Retry-After (or exponential backoff) ──→ retry (max 5 attempts)
//!        ↓
//! non-2xx → ApiError::Status
//!        ↓
//! 204 / empty body → None, otherwise parsed JSON
//! ```
//!
//! Listing endpoints follow the `next` link of each page until it is absent
//! and report `(items so far, declared total)` after every page. Bulk write
//! endpoints split their input into the batch sizes Spotify accepts. Both wait
//! the configured slowdown between requests to stay clear of rate limits.
//!
//! ## Testing
//!
//! Waiting is delegated to an injectable [`Delay`] so tests can record the
//! requested pauses instead of sleeping, and the API base URL is configurable
//! so tests can point the client at an in-process fake server.

pub mod auth;
mod playlists;
mod tracks;

use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};

use reqwest::{
    Client, Method, StatusCode,
    header::{CONTENT_TYPE, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    config::Config,
    types::{Paging, Profile},
    warning,
};

pub const MAX_ATTEMPTS: u32 = 5;
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const PAGE_LIMIT: u32 = 50;
pub const PLAYLIST_CHUNK_SIZE: usize = 100;
pub const SAVED_TRACKS_CHUNK_SIZE: usize = 50;

const BASE_BACKOFF_MS: u64 = 500;

/// Asynchronous wait used between retries, pages and chunks.
pub type Delay = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Progress callback for paginated listings: `(items so far, declared total)`.
pub type PageProgress<'a> = &'a (dyn Fn(usize, Option<u64>) + Send + Sync);

/// Delay backed by `tokio::time::sleep`.
pub fn tokio_delay() -> Delay {
    Arc::new(|duration| Box::pin(tokio::time::sleep(duration)))
}

/// Wait before retrying a rate limited request without `Retry-After`.
///
/// `attempt` starts at 1: 1s, 2s, 4s, 8s, 16s, then capped at 30s.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    Status { status: u16, message: String },
    RateLimitExceeded { attempts: u32 },
    Decode(serde_json::Error),
    EmptyBody { url: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "request to Spotify failed: {e}"),
            ApiError::Status { status, message } => {
                write!(f, "Spotify API Error: {status} {message}")
            }
            ApiError::RateLimitExceeded { attempts } => {
                write!(f, "Max retry attempts exceeded ({attempts} rate limited attempts)")
            }
            ApiError::Decode(e) => write!(f, "unexpected response from Spotify: {e}"),
            ApiError::EmptyBody { url } => write!(f, "empty response from {url}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Http(e) => Some(e),
            ApiError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Http(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err)
    }
}

/// Authenticated Spotify Web API client.
///
/// Cheap to clone; clones share the connection pool. Use
/// [`with_slowdown`](Self::with_slowdown) to derive the import and export
/// flavours from one client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    token: String,
    api_url: String,
    slowdown: Duration,
    delay: Delay,
}

impl SpotifyClient {
    /// Client for `config.api_url` using the export slowdown.
    pub fn new(token: impl Into<String>, config: &Config) -> Self {
        Self::with_base_url(token, &config.api_url).with_slowdown(config.export_delay())
    }

    /// Client for an arbitrary API base URL, without slowdown.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use myspotbackup::spotify::SpotifyClient;
    ///
    /// let client = SpotifyClient::with_base_url("token", "http://127.0.0.1:9000/v1")
    ///     .with_slowdown(Duration::from_millis(250));
    /// assert_eq!(client.url("/me"), "http://127.0.0.1:9000/v1/me");
    /// ```
    pub fn with_base_url(token: impl Into<String>, api_url: &str) -> Self {
        Self {
            http: Client::new(),
            token: token.into(),
            api_url: api_url.trim_end_matches('/').to_string(),
            slowdown: Duration::ZERO,
            delay: tokio_delay(),
        }
    }

    /// Sets the pause awaited between pages and after every write batch.
    pub fn with_slowdown(mut self, slowdown: Duration) -> Self {
        self.slowdown = slowdown;
        self
    }

    /// Replaces how waits are performed.
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn slowdown(&self) -> Duration {
        self.slowdown
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Fetches the current user's profile (`GET /me`).
    pub async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.get_json(&self.url("/me")).await
    }

    /// Sends one request with rate limit handling.
    ///
    /// Returns `Ok(None)` for 204 and zero-length responses.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, ApiError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(&self.token)
                .header(CONTENT_TYPE, "application/json");
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt == MAX_ATTEMPTS {
                    break;
                }
                let wait = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| backoff_for_attempt(attempt));
                warning!("Rate limited. Retrying in {}ms", wait.as_millis());
                (self.delay)(wait).await;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    message: error_message(status, &text),
                });
            }

            if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
                return Ok(None);
            }

            let bytes = response.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        Err(ApiError::RateLimitExceeded {
            attempts: MAX_ATTEMPTS,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        match self.request(Method::GET, url, None).await? {
            Some(body) => Ok(serde_json::from_value(body)?),
            None => Err(ApiError::EmptyBody {
                url: url.to_string(),
            }),
        }
    }

    /// Collects the items of every page starting at `url`.
    ///
    /// Pages are fetched one after the other; the slowdown is awaited before
    /// each follow-up page.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        progress: Option<PageProgress<'_>>,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());

        while let Some(page_url) = next.take() {
            let Some(body) = self.request(Method::GET, &page_url, None).await? else {
                break;
            };
            let page: Paging<T> = serde_json::from_value(body)?;
            items.extend(page.items);
            if let Some(report) = progress {
                report(items.len(), page.total);
            }

            next = page.next;
            if next.is_some() {
                self.pause().await;
            }
        }

        Ok(items)
    }

    async fn pause(&self) {
        if !self.slowdown.is_zero() {
            (self.delay)(self.slowdown).await;
        }
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string())
}
