//! HTTP client for fetching listing and product pages
//!
//! Requests are rate limited and carry browser-like headers. Timeouts and
//! non-success statuses are reported as `HarvestError`s so the run loop can
//! decide whether to retry.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client,
};
use serde::Serialize;

use crate::infrastructure::config::ScrapeConfig;
use crate::infrastructure::document_source::DocumentSource;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};

/// HTTP client configuration
#[derive(Debug, Clone, Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub accept_language: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub follow_redirects: bool,
}

impl From<&ScrapeConfig> for HttpClientConfig {
    fn from(scrape: &ScrapeConfig) -> Self {
        Self {
            user_agent: scrape.user_agent.clone(),
            accept_language: scrape.accept_language.clone(),
            timeout_seconds: scrape.page_load_timeout_seconds,
            max_requests_per_second: scrape.max_requests_per_second,
            follow_redirects: true,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&ScrapeConfig::default())
    }
}

/// HTTP client with rate limiting
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid accept-language")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
            config,
        })
    }

    pub fn from_scrape_config(scrape: &ScrapeConfig) -> Result<Self> {
        Self::new(HttpClientConfig::from(scrape))
    }

    /// Fetch URL and return text content
    pub async fn get_text(&self, url: &str) -> HarvestResult<String> {
        self.rate_limiter.until_ready().await;

        tracing::info!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| self.classify(url, e))?;

        tracing::debug!("Successfully fetched: {} ({} chars)", url, text.len());
        Ok(text)
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> HarvestError {
        if error.is_timeout() {
            HarvestError::LoadTimeout {
                url: url.to_string(),
                timeout_seconds: self.config.timeout_seconds,
            }
        } else {
            HarvestError::load_failed(url, 1, error)
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl DocumentSource for HttpClient {
    async fn fetch(&self, url: &str) -> HarvestResult<String> {
        self.get_text(url).await
    }

    async fn close(&self) -> HarvestResult<()> {
        tracing::debug!("HTTP client closed");
        Ok(())
    }
}
