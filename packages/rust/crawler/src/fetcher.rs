//! Single-page retrieval from a source's `ajax/lots` endpoint.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use lotharvest_shared::{HarvestConfig, HarvestError, Listing, Result, Source};

/// `Accept` header of a jQuery-style AJAX request.
const ACCEPT_JSON: &str = "application/json, text/javascript, */*; q=0.01";

/// Marker header some auction platforms require before serving JSON.
const X_REQUESTED_WITH: &str = "x-requested-with";

/// Retrieves one page of closed lots from one source.
///
/// Implementations must be cheap to share: the crawler holds one behind an
/// `Arc` and issues a whole window of calls against it at once.
pub trait PageFetcher: Send + Sync + 'static {
    /// Fetch 1-based `page`. An empty vec means the page had no lots.
    fn fetch_page(
        &self,
        source: &Source,
        page: u32,
    ) -> impl Future<Output = Result<Vec<Listing>>> + Send;
}

/// Response envelope of the lots endpoint.
#[derive(Debug, Deserialize)]
struct LotsPage {
    #[serde(default)]
    result_page: Option<Vec<Listing>>,
}

// ---------------------------------------------------------------------------
// HttpPageFetcher
// ---------------------------------------------------------------------------

/// [`PageFetcher`] backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    page_limit: u32,
}

impl HttpPageFetcher {
    /// Build a fetcher with the given User-Agent, timeout and page size.
    pub fn new(user_agent: &str, timeout: Duration, page_limit: u32) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            HeaderName::from_static(X_REQUESTED_WITH),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, page_limit })
    }

    /// Build a fetcher from the runtime configuration.
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Self::new(&config.user_agent, config.timeout, config.page_limit)
    }

    /// URL of one page of past lots.
    pub fn page_url(&self, source: &Source, page: u32) -> String {
        format!(
            "{}/ajax/lots/?lotsType=past&limit={}&page={page}",
            source.base(),
            self.page_limit
        )
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, source: &Source, page: u32) -> Result<Vec<Listing>> {
        let url = self.page_url(source, page);
        debug!(%url, page, "fetching page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Http {
                url,
                status: status.as_u16(),
            });
        }

        // Sources often label JSON as text/html, so decode the text ourselves.
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::Network(format!("{url}: body read failed: {e}")))?;

        let envelope: LotsPage = serde_json::from_str(&body)
            .map_err(|e| HarvestError::parse(format!("{url}: unexpected response body: {e}")))?;

        Ok(envelope.result_page.unwrap_or_default())
    }
}
