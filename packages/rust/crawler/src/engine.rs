//! Windowed pagination over one source.
//!
//! Pages are requested in windows of `concurrency` consecutive page numbers.
//! Every request in a window must finish before the crawler decides whether
//! to continue, and the crawl ends only when a whole window comes back empty.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use lotharvest_shared::{HarvestError, Listing, Result, Source};

use crate::fetcher::PageFetcher;

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Everything retrieved from one source.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// All listings, in page order.
    pub listings: Vec<Listing>,
    /// Number of page requests issued, empty pages included.
    pub pages_requested: u32,
    /// Number of pages that returned at least one listing.
    pub pages_with_lots: u32,
    /// Windows issued, including the final empty one.
    pub windows: u32,
    /// Total duration of the crawl.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// SourceCrawler
// ---------------------------------------------------------------------------

/// Drives a [`PageFetcher`] across one source until it runs dry.
pub struct SourceCrawler<F> {
    fetcher: Arc<F>,
    concurrency: u32,
}

impl<F: PageFetcher> SourceCrawler<F> {
    /// Create a crawler issuing `concurrency` pages per window.
    pub fn new(fetcher: Arc<F>, concurrency: u32) -> Result<Self> {
        if concurrency == 0 {
            return Err(HarvestError::config("concurrency must be at least 1"));
        }
        Ok(Self {
            fetcher,
            concurrency,
        })
    }

    /// Crawl `source` from page 1 until a window returns no listings.
    ///
    /// `on_page` is called for every page of every window, in page order,
    /// once the window has joined. Any failed page aborts the crawl after the
    /// rest of its window has finished; nothing is retried.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn crawl(
        &self,
        source: &Source,
        mut on_page: impl FnMut(u32, usize),
    ) -> Result<CrawlResult> {
        let start = Instant::now();
        let mut listings: Vec<Listing> = Vec::new();
        let mut cursor: u32 = 1;
        let mut pages_requested: u32 = 0;
        let mut pages_with_lots: u32 = 0;
        let mut windows: u32 = 0;

        info!(concurrency = self.concurrency, "starting crawl");

        loop {
            let window = self.fetch_window(source, cursor).await;
            windows += 1;
            pages_requested += self.concurrency;

            let mut got_any = false;
            for (page, outcome) in window {
                let lots = outcome?;
                on_page(page, lots.len());

                if !lots.is_empty() {
                    got_any = true;
                    pages_with_lots += 1;
                    listings.extend(lots);
                }
            }

            if !got_any {
                debug!(window_start = cursor, "window empty, crawl done");
                break;
            }

            cursor += self.concurrency;
        }

        let result = CrawlResult {
            listings,
            pages_requested,
            pages_with_lots,
            windows,
            duration: start.elapsed(),
        };

        info!(
            listings = result.listings.len(),
            pages_with_lots = result.pages_with_lots,
            windows = result.windows,
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok(result)
    }

    /// Fetch pages `[start, start + concurrency)` concurrently and wait for all.
    async fn fetch_window(&self, source: &Source, start: u32) -> Vec<(u32, Result<Vec<Listing>>)> {
        let mut handles = Vec::with_capacity(self.concurrency as usize);

        for page in start..start + self.concurrency {
            let fetcher = Arc::clone(&self.fetcher);
            let source = source.clone();
            handles.push((
                page,
                tokio::spawn(async move { fetcher.fetch_page(&source, page).await }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (page, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) => Err(HarvestError::Network(format!(
                    "{source}: fetch task for page {page} failed: {e}"
                ))),
            };
            outcomes.push((page, outcome));
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    /// Serves a fixed number of lots per page; unlisted pages are empty.
    struct ScriptedFetcher {
        lots_per_page: HashMap<u32, usize>,
        failing_page: Option<u32>,
        calls: Mutex<Vec<u32>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(pages: &[(u32, usize)]) -> Self {
            Self {
                lots_per_page: pages.iter().copied().collect(),
                failing_page: None,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        fn failing_on(mut self, page: u32) -> Self {
            self.failing_page = Some(page);
            self
        }

        fn called_pages(&self) -> Vec<u32> {
            let mut pages = self.calls.lock().unwrap().clone();
            pages.sort_unstable();
            pages
        }
    }

    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, _source: &Source, page: u32) -> Result<Vec<Listing>> {
            self.calls.lock().unwrap().push(page);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing_page == Some(page) {
                return Err(HarvestError::Http {
                    url: format!("page {page}"),
                    status: 500,
                });
            }

            let count = self.lots_per_page.get(&page).copied().unwrap_or(0);
            Ok((0..count)
                .map(|i| {
                    serde_json::from_value(json!({ "row_id": format!("{page}-{i}") })).unwrap()
                })
                .collect())
        }
    }

    fn source() -> Source {
        Source::parse("https://bid.example.com").unwrap()
    }

    #[tokio::test]
    async fn stops_after_first_fully_empty_window() {
        // Pages 1 and 3 carry lots; everything from 4 on is empty.
        let fetcher = Arc::new(ScriptedFetcher::new(&[(1, 5), (3, 5)]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 10).unwrap();

        let result = crawler.crawl(&source(), |_, _| {}).await.unwrap();

        assert_eq!(result.listings.len(), 10);
        assert_eq!(result.windows, 2);
        assert_eq!(result.pages_requested, 20);
        assert_eq!(result.pages_with_lots, 2);
        assert_eq!(fetcher.called_pages(), (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn sparse_pages_inside_a_window_do_not_stop_the_crawl() {
        // Window 1 is empty except for page 10; window 2 only has page 12.
        let fetcher = Arc::new(ScriptedFetcher::new(&[(10, 1), (12, 2)]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 10).unwrap();

        let result = crawler.crawl(&source(), |_, _| {}).await.unwrap();

        assert_eq!(result.listings.len(), 3);
        assert_eq!(result.windows, 3);
    }

    #[tokio::test]
    async fn empty_source_costs_one_window() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 10).unwrap();

        let result = crawler.crawl(&source(), |_, _| {}).await.unwrap();

        assert!(result.listings.is_empty());
        assert_eq!(result.windows, 1);
        assert_eq!(fetcher.called_pages().len(), 10);
    }

    #[tokio::test]
    async fn listings_keep_page_order() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[(1, 1), (2, 1), (3, 1)]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 3).unwrap();

        let result = crawler.crawl(&source(), |_, _| {}).await.unwrap();

        let ids: Vec<String> = result
            .listings
            .iter()
            .map(|l| l.row_id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["1-0", "2-0", "3-0"]);
    }

    #[tokio::test]
    async fn reports_every_page_in_order() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[(1, 2), (2, 4)]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 2).unwrap();

        let mut seen = Vec::new();
        crawler
            .crawl(&source(), |page, lots| seen.push((page, lots)))
            .await
            .unwrap();

        assert_eq!(seen, vec![(1, 2), (2, 4), (3, 0), (4, 0)]);
    }

    #[tokio::test]
    async fn a_whole_window_is_in_flight_at_once() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[(1, 1)]));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 10).unwrap();

        crawler.crawl(&source(), |_, _| {}).await.unwrap();

        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn failed_page_aborts_the_crawl() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[(1, 3), (2, 3), (12, 3)]).failing_on(4));
        let crawler = SourceCrawler::new(Arc::clone(&fetcher), 10).unwrap();

        let err = crawler.crawl(&source(), |_, _| {}).await.unwrap_err();

        assert!(matches!(err, HarvestError::Http { status: 500, .. }));
        // The failing window still ran to completion, but no further window started.
        assert_eq!(fetcher.called_pages(), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        assert!(SourceCrawler::new(fetcher, 0).is_err());
    }
}
