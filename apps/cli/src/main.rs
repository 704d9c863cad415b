//! LotHarvest CLI: incremental harvesting of closed auction lots.
//!
//! Crawls each configured auction house's past-lots API, keeps the lots that
//! sold, and merges them into a per-site JSON dataset.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
