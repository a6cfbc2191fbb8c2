use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use url::Url;

use super::models::{Entry, FeedSource};
use super::parser::parse_feed;
use crate::config::AppConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;
const CLIENT_USER_AGENT: &str = concat!("headline/", env!("CARGO_PKG_VERSION"));

/// Capability to turn a feed URL into its ordered entries
#[async_trait::async_trait]
pub trait FeedFetch: Send + Sync {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<Entry>>;
}

/// HTTP feed fetcher backed by reqwest and feed-rs
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Self::build_client(config.sync.request_timeout_secs, &config.sync.proxy_url)?;
        Ok(Self { client })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5"
            )
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers
    }

    /// Fetch with short in-request retries for 429 and 503 responses
    async fn fetch_with_retry(&self, url: &str) -> Result<(StatusCode, Bytes)> {
        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..MAX_RETRIES {
            tracing::debug!("Fetch attempt {} for {}", attempt + 1, url);

            match self.client.get(url).headers(Self::build_headers()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!(
                            "Received {} for {}, retrying after {}ms...",
                            status,
                            url,
                            delay_ms
                        );
                        last_error = Some(Error::Fetch(format!("HTTP {} for URL: {}", status, url)));
                    } else {
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, bytes)),
                            Err(e) => {
                                tracing::warn!("Failed to read response body: {}", e);
                                last_error = Some(Error::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Request failed for {} (attempt {}): {}",
                        url,
                        attempt + 1,
                        e
                    );
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Fetch(format!("Failed to fetch URL after {} retries: {}", MAX_RETRIES, url))))
    }

    /// Fetch raw feed bytes, enforcing status and size limits
    pub async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        Url::parse(url)?;

        let (status, content) = self.fetch_with_retry(url).await?;

        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {} for URL: {}", status, url)));
        }

        if content.len() > MAX_FEED_BYTES {
            return Err(Error::Fetch(format!(
                "Feed too large ({} bytes) for URL: {}",
                content.len(),
                url
            )));
        }

        if is_cloudflare_challenge(&content) {
            return Err(Error::Fetch(format!(
                "Cloudflare JavaScript challenge detected for URL: {}. \
                Configure a proxy in [sync] proxy_url.",
                url
            )));
        }

        Ok(content)
    }
}

#[async_trait::async_trait]
impl FeedFetch for FeedFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<Entry>> {
        tracing::debug!(feed = %source.name, url = %source.url, "Fetching feed");
        let content = self.fetch_raw(&source.url).await?;
        parse_feed(&content, &source.name)
    }
}

/// Check the first 2KB of a body for Cloudflare challenge markers
fn is_cloudflare_challenge(content: &[u8]) -> bool {
    let check_len = content.len().min(2048);
    let preview = String::from_utf8_lossy(&content[..check_len]);

    preview.contains("Just a moment...")
        || preview.contains("cf-browser-verification")
        || preview.contains("_cf_chl_opt")
        || preview.contains("challenge-platform")
}
