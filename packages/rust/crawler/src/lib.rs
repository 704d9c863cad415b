//! Paginated retrieval of closed lots from auction-house APIs.
//!
//! This crate provides:
//! - [`fetcher`]: the [`PageFetcher`] seam and its `reqwest` implementation
//! - [`engine`]: [`SourceCrawler`], windowed concurrent pagination over one source

pub mod engine;
pub mod fetcher;

pub use engine::{CrawlResult, SourceCrawler};
pub use fetcher::{HttpPageFetcher, PageFetcher};
