//! End-to-end harvest: source → crawl → sold filter → merge → dataset file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use lotharvest_crawler::{HttpPageFetcher, PageFetcher, SourceCrawler};
use lotharvest_shared::{HarvestConfig, HarvestError, Result, Source};
use lotharvest_storage::{DatasetStore, MergeSummary};

use crate::filter::retain_sold;

/// Outcome of harvesting one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: Source,
    /// Dataset file that was written.
    pub dataset: PathBuf,
    /// Listings retrieved before filtering.
    pub fetched: usize,
    /// Listings that passed the sold filter.
    pub sold: usize,
    pub summary: MergeSummary,
    pub elapsed: Duration,
}

/// Outcome of a whole run across all configured sources.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub succeeded: Vec<SourceReport>,
    pub failed: Vec<(Source, HarvestError)>,
    pub elapsed: Duration,
}

impl HarvestReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Progress callback for reporting harvest status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a source's crawl starts.
    fn source_started(&self, source: &Source);
    /// Called for every page of every window, in page order.
    fn page_fetched(&self, source: &Source, page: u32, lots: usize);
    /// Called once a source's dataset has been written.
    fn source_merged(&self, report: &SourceReport);
    /// Called when a source's run aborts. Later sources still run.
    fn source_failed(&self, source: &Source, error: &HarvestError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn source_started(&self, _source: &Source) {}
    fn page_fetched(&self, _source: &Source, _page: u32, _lots: usize) {}
    fn source_merged(&self, _report: &SourceReport) {}
    fn source_failed(&self, _source: &Source, _error: &HarvestError) {}
}

/// Harvest every configured source over HTTP.
///
/// Fails only on invalid configuration; per-source failures are collected in
/// the returned report.
pub async fn harvest_all(
    config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> Result<HarvestReport> {
    config.validate()?;
    let fetcher = Arc::new(HttpPageFetcher::from_config(config)?);
    let crawler = SourceCrawler::new(fetcher, config.concurrency)?;
    Ok(harvest_with(&crawler, config, progress).await)
}

/// Harvest every configured source with the given crawler.
///
/// Sources run one after another. A source that fails is reported and
/// skipped; its dataset file is left untouched.
#[instrument(skip_all, fields(sources = config.sources.len()))]
pub async fn harvest_with<F: PageFetcher>(
    crawler: &SourceCrawler<F>,
    config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> HarvestReport {
    let start = Instant::now();
    let mut report = HarvestReport::default();

    for source in &config.sources {
        let dataset = config.dataset_path(source);
        progress.source_started(source);

        match harvest_source(crawler, source, &dataset, progress).await {
            Ok(source_report) => {
                progress.source_merged(&source_report);
                report.succeeded.push(source_report);
            }
            Err(e) => {
                warn!(%source, error = %e, "source harvest failed");
                progress.source_failed(source, &e);
                report.failed.push((source.clone(), e));
            }
        }
    }

    report.elapsed = start.elapsed();
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        elapsed_ms = report.elapsed.as_millis(),
        "harvest finished"
    );
    report
}

/// Crawl one source, keep its sold lots, and merge them into `dataset`.
///
/// The dataset is loaded before crawling so a corrupt file fails fast, and
/// written only after the merge has completed.
#[instrument(skip_all, fields(source = %source, dataset = %dataset.display()))]
pub async fn harvest_source<F: PageFetcher>(
    crawler: &SourceCrawler<F>,
    source: &Source,
    dataset: &Path,
    progress: &dyn ProgressReporter,
) -> Result<SourceReport> {
    let start = Instant::now();
    let mut store = DatasetStore::open(dataset)?;

    let crawl = crawler
        .crawl(source, |page, lots| progress.page_fetched(source, page, lots))
        .await?;

    let fetched = crawl.listings.len();
    let sold = retain_sold(crawl.listings);
    info!(fetched, sold = sold.len(), "filtered sold lots");

    let summary = store.merge(&sold, source);
    store.save()?;

    Ok(SourceReport {
        source: source.clone(),
        dataset: store.path().to_path_buf(),
        fetched,
        sold: sold.len(),
        summary,
        elapsed: start.elapsed(),
    })
}
