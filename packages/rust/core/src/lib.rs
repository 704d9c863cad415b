//! Harvest orchestration for LotHarvest.
//!
//! This crate ties crawling, sold-lot filtering, and dataset merging into the
//! per-source pipeline run by the CLI (see [`pipeline::harvest_all`]).

pub mod filter;
pub mod pipeline;

pub use filter::retain_sold;
pub use pipeline::{
    HarvestReport, ProgressReporter, SilentProgress, SourceReport, harvest_all, harvest_source,
    harvest_with,
};

pub use lotharvest_storage::MergeSummary;
