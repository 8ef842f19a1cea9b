//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the archiver, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Gating each request on a connection slot, a concurrency permit and the
//!   memory/CPU budget
//! - Content-type and size checks on resources, enforced while streaming
//! - Bandwidth accounting through the shared limiter
//! - Retry logic for timeouts and connection failures
//!
//! Failures are values ([`FetchFailure`]), never errors: one bad resource
//! must not end a run.

mod client;
mod result;

pub use client::build_http_client;
pub use result::{Download, DownloadResult, FetchFailure, Page};

use crate::config::Config;
use crate::content::encoding::{charset_from_content_type, decode_text};
use crate::limiter::ResourceLimiter;
use crate::url::validate_url;
use reqwest::{Client, Response};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

/// Content types accepted for resources; `type/*` matches any subtype
pub const RESOURCE_TYPES: &[&str] = &[
    "text/*",
    "image/*",
    "video/*",
    "application/javascript",
    "application/x-javascript",
    "application/json",
    "application/xml",
    "application/css",
];

/// Whether a resource with this Content-Type may be downloaded
pub fn is_allowed_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if essence.is_empty() {
        return false;
    }
    RESOURCE_TYPES.iter().any(|allowed| match allowed.strip_suffix('*') {
        Some(prefix) => essence.starts_with(prefix),
        None => essence == *allowed,
    })
}

/// Resource-gated HTTP fetcher shared by every task of one run
pub struct Fetcher {
    client: Client,
    limiter: Arc<ResourceLimiter>,
    permits: Semaphore,
    fetched: Mutex<HashSet<String>>,
    allowed_protocols: Vec<String>,
    warn_on_http: bool,
    max_file_size: u64,
    retry_attempts: u32,
    retry_delay: Duration,
    min_confidence: f32,
    fallback_encoding: String,
}

impl Fetcher {
    /// Creates a fetcher drawing on `limiter`
    ///
    /// # Returns
    ///
    /// * `Ok(Fetcher)` - Ready to fetch
    /// * `Err(reqwest::Error)` - The HTTP client could not be built
    pub fn new(config: &Config, limiter: Arc<ResourceLimiter>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(&config.download)?,
            limiter,
            permits: Semaphore::new(config.download.max_concurrent),
            fetched: Mutex::new(HashSet::new()),
            allowed_protocols: config.security.allowed_protocols.clone(),
            warn_on_http: config.security.warn_on_http,
            max_file_size: config.limits.max_file_size,
            retry_attempts: config.download.retry_attempts,
            retry_delay: Duration::from_millis(config.download.retry_delay_ms),
            min_confidence: config.encoding.min_confidence,
            fallback_encoding: config.encoding.fallback.clone(),
        })
    }

    pub fn limiter(&self) -> &ResourceLimiter {
        &self.limiter
    }

    fn already_fetched(&self, url: &str) -> bool {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(url)
    }

    fn mark_fetched(&self, url: &str) {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string());
    }

    /// Forgets every URL fetched so far
    pub fn clear_cache(&self) {
        self.fetched.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn check_url(&self, raw: &str) -> Result<Url, FetchFailure> {
        let checked = validate_url(raw, &self.allowed_protocols, self.warn_on_http).map_err(
            |e| match e {
                crate::UrlError::InvalidScheme(scheme) => FetchFailure::InvalidProtocol(scheme),
                other => FetchFailure::InvalidUrlFormat(other.to_string()),
            },
        )?;
        if checked.insecure {
            tracing::warn!("Using insecure HTTP for {}", checked.url);
        }
        Ok(checked.url)
    }

    /// Fetches an HTML page
    ///
    /// Returns `None` when the URL is invalid or already fetched, when a
    /// budget declines the request, on transport errors, and when the body
    /// would exceed the bandwidth window.
    pub async fn fetch_page(&self, raw: &str) -> Option<Page> {
        let url = match self.check_url(raw) {
            Ok(url) => url,
            Err(failure) => {
                tracing::error!("Cannot fetch page {}: {}", raw, failure);
                return None;
            }
        };
        if self.already_fetched(url.as_str()) {
            tracing::debug!("Page already fetched: {}", url);
            return None;
        }

        let Some(_slot) = self.limiter.try_connection() else {
            tracing::warn!("Connection limit reached, not fetching {}", url);
            return None;
        };
        let _permit = self.permits.acquire().await.ok()?;
        if !self.limiter.check_resources() {
            tracing::warn!("Resource limits reached, not fetching {}", url);
            return None;
        }

        let response = match self.send(&url).await {
            Ok(response) => response,
            Err(failure) => {
                tracing::error!("Failed to fetch page {}: {}", url, failure);
                return None;
            }
        };
        let final_url = response.url().clone();
        let content_type = header_content_type(&response);

        let body = match self.read_body(response).await {
            Ok(body) => body,
            Err(failure) => {
                tracing::error!("Failed to read page {}: {}", url, failure);
                return None;
            }
        };

        if !self.limiter.check_and_reserve_bandwidth(body.len() as u64) {
            tracing::warn!("Bandwidth limit exceeded for {}", url);
            return None;
        }

        self.mark_fetched(url.as_str());
        tracing::info!("Fetched page {} ({} bytes)", final_url, body.len());
        Some(Page {
            url: final_url,
            body,
            content_type,
        })
    }

    /// Downloads one resource
    ///
    /// Checks run in order: duplicate, URL validation, connection slot,
    /// concurrency permit, memory/CPU, then the response's content type,
    /// its declared and actual size, and finally bandwidth.
    pub async fn fetch_resource(&self, raw: &str) -> DownloadResult {
        let started = Instant::now();
        let outcome = self.download(raw).await;

        match &outcome {
            Ok(download) => {
                tracing::debug!("Downloaded {} ({} bytes)", raw, download.size);
            }
            Err(failure) => {
                tracing::warn!("Download of {} failed [{}]: {}", raw, failure.as_str(), failure);
            }
        }

        DownloadResult {
            url: raw.to_string(),
            elapsed: started.elapsed(),
            outcome,
        }
    }

    async fn download(&self, raw: &str) -> Result<Download, FetchFailure> {
        if self.already_fetched(raw) {
            return Err(FetchFailure::DuplicateUrl);
        }
        let url = self.check_url(raw)?;

        let _slot = self
            .limiter
            .try_connection()
            .ok_or(FetchFailure::ConnectionLimit)?;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchFailure::Unexpected(e.to_string()))?;
        if !self.limiter.check_resources() {
            return Err(FetchFailure::ResourceLimit);
        }

        let response = self.send(&url).await?;

        let content_type = header_content_type(&response).unwrap_or_default();
        if !is_allowed_content_type(&content_type) {
            return Err(FetchFailure::InvalidContentType(content_type));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_file_size {
                return Err(FetchFailure::SizeExceeded {
                    size: declared,
                    limit: self.max_file_size,
                });
            }
        }

        let content = self.read_body(response).await?;
        let size = content.len() as u64;
        if !self.limiter.check_and_reserve_bandwidth(size) {
            return Err(FetchFailure::BandwidthLimit);
        }

        self.mark_fetched(raw);
        Ok(Download {
            content,
            content_type,
            size,
        })
    }

    /// Downloads a text resource (external stylesheet or script) as UTF-8
    ///
    /// The body is decoded from the charset declared in its Content-Type,
    /// or from the detected encoding when none is declared.
    pub async fn fetch_text(&self, raw: &str) -> Result<String, FetchFailure> {
        let download = self.fetch_resource(raw).await.outcome?;
        let declared = charset_from_content_type(&download.content_type);
        Ok(decode_text(
            &download.content,
            declared,
            self.min_confidence,
            &self.fallback_encoding,
        ))
    }

    /// GET with retries on timeouts and connection failures
    async fn send(&self, url: &Url) -> Result<Response, FetchFailure> {
        let mut attempt = 0;
        loop {
            match self.client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    return Err(FetchFailure::Transport(format!(
                        "HTTP {}",
                        response.status().as_u16()
                    )))
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} after error ({}/{}): {}",
                        url,
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) if e.is_timeout() => {
                    return Err(FetchFailure::Transport("Request timeout".to_string()))
                }
                Err(e) => return Err(FetchFailure::Transport(e.to_string())),
            }
        }
    }

    /// Reads the body chunk by chunk, stopping once it passes `max_file_size`
    async fn read_body(&self, mut response: Response) -> Result<Vec<u8>, FetchFailure> {
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_file_size {
                return Err(FetchFailure::SizeExceeded {
                    size: body.len() as u64,
                    limit: self.max_file_size,
                });
            }
        }
        Ok(body)
    }
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
