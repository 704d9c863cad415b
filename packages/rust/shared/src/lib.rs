//! Shared types, error model, and configuration for LotHarvest.
//!
//! This crate is the foundation depended on by all other LotHarvest crates.
//! It provides:
//! - [`HarvestError`]: the unified error type
//! - Domain types ([`Listing`], [`CanonicalRecord`], [`RowId`], [`Source`])
//! - Date handling ([`normalize_date`], [`pick_sold_date`])
//! - Configuration ([`AppConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod dates;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_SOURCES, DefaultsConfig, HarvestConfig, SourceEntry, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use dates::{normalize_date, pick_sold_date};
pub use error::{HarvestError, Result};
pub use types::{CanonicalRecord, Listing, RowId, Slot, Source, is_truthy};
