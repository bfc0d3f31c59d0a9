//! Sequential harvesting run
//!
//! Listing page → product links → for each link: load (with retry), extract,
//! map, aggregate, then wait a randomized politeness delay. One document is
//! fully processed before the next is requested. The document source is
//! closed when the run ends, whether it completed, failed or was cancelled.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::batch_aggregator::BatchAggregator;
use crate::application::schema_mapper::SchemaMapper;
use crate::infrastructure::config::{defaults, AppConfig, ScrapeConfig};
use crate::infrastructure::document_source::DocumentSource;
use crate::infrastructure::harvest_error::{HarvestError, HarvestResult};
use crate::infrastructure::parsing::{ListParseContext, ProductDetailParser, ProductListParser};
use crate::infrastructure::record_store::RecordStore;

/// Outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    pub links_found: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub flushed_records: usize,
    pub cancelled: bool,
}

pub struct HarvestSession {
    source: Arc<dyn DocumentSource>,
    store: Box<dyn RecordStore>,
    list_parser: ProductListParser,
    detail_parser: ProductDetailParser,
    mapper: SchemaMapper,
    scrape: ScrapeConfig,
    retry_backoff: Duration,
    cancel: CancellationToken,
}

impl HarvestSession {
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn DocumentSource>,
        store: Box<dyn RecordStore>,
        cancel: CancellationToken,
    ) -> HarvestResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            list_parser: ProductListParser::new(&config.link_collector)?,
            detail_parser: ProductDetailParser::from_config(config)?,
            mapper: SchemaMapper::from_config(&config.schema),
            scrape: config.scrape.clone(),
            retry_backoff: Duration::from_millis(defaults::RETRY_BACKOFF_MS),
            cancel,
        })
    }

    /// Wait between a failed load and its retry
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Run to completion or cancellation. The source is always closed.
    pub async fn run(&self) -> Result<HarvestSummary> {
        let outcome = self.run_links().await;
        if let Err(e) = self.source.close().await {
            warn!("Failed to close document source: {}", e);
        }
        outcome
    }

    async fn run_links(&self) -> Result<HarvestSummary> {
        let mut summary = HarvestSummary::default();

        let listing_url = self.scrape.listing_url.as_str();
        let listing_html = match self.fetch_with_retry(listing_url).await {
            Ok(html) => html,
            Err(HarvestError::Cancelled) => {
                summary.cancelled = true;
                return Ok(summary);
            }
            Err(e) => return Err(e).context("Failed to load listing page"),
        };

        let links = self.list_parser.collect_links(
            &listing_html,
            &ListParseContext::new(self.scrape.base_url.clone(), self.scrape.target_count),
        )?;
        summary.links_found = links.len();
        info!("Found {} product links on {}", links.len(), listing_url);

        let mut aggregator =
            BatchAggregator::new(self.mapper.field_names().to_vec(), self.scrape.flush_every);

        for (index, url) in links.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            info!("Scraping {}/{}: {}", index + 1, links.len(), url);
            let outcome = self
                .fetch_with_retry(url)
                .await
                .and_then(|html| self.detail_parser.parse_document(&html, url));
            match outcome {
                Ok(product) => {
                    let record = self.mapper.map_product(&product);
                    summary.succeeded += 1;
                    if aggregator.push(record) {
                        self.flush(&mut aggregator).await;
                    }
                }
                Err(HarvestError::Cancelled) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    error!("Skipping {}: {}", url, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Aborting run at {}: {}", url, e);
                    self.flush(&mut aggregator).await;
                    return Err(e).with_context(|| format!("Unrecoverable error at {url}"));
                }
            }

            if index + 1 < links.len() && !self.politeness_delay().await {
                summary.cancelled = true;
                break;
            }
        }

        if summary.cancelled {
            info!("Run cancelled; flushing records collected so far");
        }
        aggregator
            .flush(self.store.as_ref())
            .await
            .with_context(|| format!("Failed to write records to {}", self.store.location()))?;
        summary.flushed_records = aggregator.flushed_total();

        info!(
            "Run finished: {} succeeded, {} failed, {} records written",
            summary.succeeded, summary.failed, summary.flushed_records
        );
        Ok(summary)
    }

    /// Mid-run flush. A failure keeps the records pending for the next flush.
    async fn flush(&self, aggregator: &mut BatchAggregator) {
        if let Err(e) = aggregator.flush(self.store.as_ref()).await {
            warn!("Flush failed, keeping {} records pending: {}", aggregator.pending().len(), e);
        }
    }

    /// Load a document, retrying failed loads up to `load_retries` times.
    async fn fetch_with_retry(&self, url: &str) -> HarvestResult<String> {
        let attempts = self.scrape.load_retries + 1;
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(HarvestError::Cancelled),
                result = self.source.fetch(url) => result,
            };

            match result {
                Ok(html) => {
                    debug!("Loaded {} on attempt {}", url, attempt);
                    return Ok(html);
                }
                Err(HarvestError::Cancelled) => return Err(HarvestError::Cancelled),
                Err(e) if attempt < attempts && e.is_retryable_load() => {
                    warn!("Attempt {} failed for {}: {}. Retrying...", attempt, url, e);
                    attempt += 1;
                    if !self.wait(self.retry_backoff).await {
                        return Err(HarvestError::Cancelled);
                    }
                }
                Err(e) => {
                    return Err(if attempt > 1 {
                        HarvestError::load_failed(url, attempt, e)
                    } else {
                        e
                    });
                }
            }
        }
    }

    /// Random delay in the configured window. Returns `false` if cancelled.
    async fn politeness_delay(&self) -> bool {
        let delay_ms =
            fastrand::u64(self.scrape.request_delay_min_ms..=self.scrape.request_delay_max_ms);
        debug!("Waiting {}ms before next request", delay_ms);
        self.wait(Duration::from_millis(delay_ms)).await
    }

    async fn wait(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::record_store::CsvRecordStore;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LISTING_URL: &str = "https://www.amazon.in/s?k=kurta";

    const LISTING: &str = r#"
        <a class="a-link-normal s-no-outline" href="/Kurta/dp/B0ONE?ref=1">one</a>
        <a class="a-link-normal s-no-outline" href="/Frock/dp/B0TWO?ref=2">two</a>
    "#;

    const DETAIL: &str = r#"
        <span id="productTitle">Girls Kurta</span>
        <div id="detailBullets_feature_div"><ul>
          <li><span>Department : Girls</span></li>
        </ul></div>
    "#;

    /// Replays scripted responses per URL; a URL with no script left fails.
    struct ScriptedSource {
        scripts: Mutex<HashMap<String, VecDeque<HarvestResult<String>>>>,
        fetches: AtomicUsize,
        closed: AtomicBool,
    }

    impl ScriptedSource {
        fn new(scripts: Vec<(&str, Vec<HarvestResult<String>>)>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(
                    scripts
                        .into_iter()
                        .map(|(url, responses)| (url.to_string(), responses.into()))
                        .collect(),
                ),
                fetches: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl DocumentSource for ScriptedSource {
        async fn fetch(&self, url: &str) -> HarvestResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.scripts
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Err(HarvestError::load_failed(url, 1, "no response scripted")))
        }

        async fn close(&self) -> HarvestResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn timeout(url: &str) -> HarvestResult<String> {
        Err(HarvestError::LoadTimeout {
            url: url.to_string(),
            timeout_seconds: 30,
        })
    }

    fn config(output: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.scrape.listing_url = LISTING_URL.to_string();
        config.scrape.request_delay_min_ms = 0;
        config.scrape.request_delay_max_ms = 0;
        config.scrape.output_path = output.to_path_buf();
        config
    }

    fn session(
        config: &AppConfig,
        source: Arc<ScriptedSource>,
        cancel: CancellationToken,
    ) -> HarvestSession {
        HarvestSession::new(
            config,
            source,
            Box::new(CsvRecordStore::new(&config.scrape.output_path)),
            cancel,
        )
        .unwrap()
        .with_retry_backoff(Duration::ZERO)
    }

    #[tokio::test]
    async fn retry_after_timeout_yields_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("out.csv"));
        let one = "https://www.amazon.in/Kurta/dp/B0ONE";
        let two = "https://www.amazon.in/Frock/dp/B0TWO";
        let source = ScriptedSource::new(vec![
            (LISTING_URL, vec![Ok(LISTING.to_string())]),
            (one, vec![timeout(one), Ok(DETAIL.to_string())]),
            (two, vec![timeout(two), timeout(two)]),
        ]);

        let summary = session(&config, source.clone(), CancellationToken::new())
            .run()
            .await
            .unwrap();

        assert_eq!(
            summary,
            HarvestSummary {
                links_found: 2,
                succeeded: 1,
                failed: 1,
                flushed_records: 1,
                cancelled: false,
            }
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 5);
        assert!(source.closed.load(Ordering::SeqCst));

        let stored = CsvRecordStore::new(&config.scrape.output_path).load().await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
        let record = &stored.records()[0];
        assert_eq!(record.get("Dress name"), Some("Girls Kurta"));
        assert_eq!(record.get("Gender"), Some("Girls"));
        assert_eq!(record.get("URL"), Some(one));
        assert_eq!(record.get("Colour"), Some(""));
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("out.csv"));
        let one = "https://www.amazon.in/Kurta/dp/B0ONE";
        let source = ScriptedSource::new(vec![
            (LISTING_URL, vec![Ok(LISTING.to_string())]),
            (
                one,
                vec![
                    Err(HarvestError::HttpStatus {
                        status: 404,
                        url: one.to_string(),
                    }),
                    Ok(DETAIL.to_string()),
                ],
            ),
            ("https://www.amazon.in/Frock/dp/B0TWO", vec![Ok(DETAIL.to_string())]),
        ]);

        let summary = session(&config, source.clone(), CancellationToken::new())
            .run()
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_error_aborts_but_keeps_earlier_records() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("out.csv"));
        let two = "https://www.amazon.in/Frock/dp/B0TWO";
        let source = ScriptedSource::new(vec![
            (LISTING_URL, vec![Ok(LISTING.to_string())]),
            ("https://www.amazon.in/Kurta/dp/B0ONE", vec![Ok(DETAIL.to_string())]),
            (
                two,
                vec![Err(HarvestError::configuration("scrape.base_url", "not a base"))],
            ),
        ]);

        let result = session(&config, source.clone(), CancellationToken::new()).run().await;

        assert!(result.is_err());
        assert!(source.closed.load(Ordering::SeqCst));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
        let stored = CsvRecordStore::new(&config.scrape.output_path).load().await.unwrap().unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn listing_failure_still_closes_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("out.csv"));
        let source = ScriptedSource::new(vec![]);

        let result = session(&config, source.clone(), CancellationToken::new()).run().await;
        assert!(result.is_err());
        assert!(source.closed.load(Ordering::SeqCst));
        assert!(!config.scrape.output_path.exists());
    }

    #[tokio::test]
    async fn cancelled_run_requests_nothing_further() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("out.csv"));
        let source = ScriptedSource::new(vec![(LISTING_URL, vec![Ok(LISTING.to_string())])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = session(&config, source.clone(), cancel).run().await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 0);
        assert!(source.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn flushes_every_n_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&dir.path().join("out.csv"));
        config.scrape.flush_every = 1;
        let source = ScriptedSource::new(vec![
            (LISTING_URL, vec![Ok(LISTING.to_string())]),
            ("https://www.amazon.in/Kurta/dp/B0ONE", vec![Ok(DETAIL.to_string())]),
            ("https://www.amazon.in/Frock/dp/B0TWO", vec![Ok(DETAIL.to_string())]),
        ]);

        let summary = session(&config, source, CancellationToken::new()).run().await.unwrap();
        assert_eq!(summary.flushed_records, 2);
        let stored = CsvRecordStore::new(&config.scrape.output_path).load().await.unwrap().unwrap();
        assert_eq!(stored.len(), 2);
    }
}
