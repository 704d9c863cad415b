//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lotharvest_core::{HarvestReport, ProgressReporter, SourceReport};
use lotharvest_shared::{
    AppConfig, HarvestConfig, HarvestError, Source, init_config, load_config, load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// LotHarvest: keep a local, deduplicated record of closed auction lots.
#[derive(Parser)]
#[command(
    name = "lotharvest",
    version,
    about = "Harvest sold lots from auction-house APIs into per-site JSON datasets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.lotharvest/lotharvest.toml.
    #[arg(long = "config", env = "LOTHARVEST_CONFIG", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch closed lots from every source and merge them into the datasets.
    Run {
        /// Source base URL (repeatable). Replaces the configured sources.
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Directory for the `{host}_lots.json` datasets.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Pages requested together per window.
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crates whose events are shown at the chosen verbosity.
const LOG_TARGETS: &[&str] = &[
    "lotharvest",
    "lotharvest_core",
    "lotharvest_crawler",
    "lotharvest_storage",
    "lotharvest_shared",
];

/// Initialize tracing based on CLI flags. Logs go to stderr; progress lines
/// own stdout.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            sources,
            out,
            concurrency,
        } => {
            let config = read_config(cli.config_file.as_deref())?;
            cmd_run(&config, &sources, out, concurrency).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => {
                let config = read_config(cli.config_file.as_deref())?;
                cmd_config_show(&config).await
            }
        },
    }
}

/// Load the config from `--config` if given, else from the default location.
fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Merge CLI overrides into the file configuration.
fn resolve_config(
    config: &AppConfig,
    sources: &[String],
    out: Option<PathBuf>,
    concurrency: Option<u32>,
) -> std::result::Result<HarvestConfig, HarvestError> {
    let mut harvest = HarvestConfig::try_from(config)?;

    if !sources.is_empty() {
        harvest.sources = sources
            .iter()
            .map(|s| Source::parse(s))
            .collect::<std::result::Result<Vec<_>, _>>()?;
    }
    if let Some(dir) = out {
        harvest.output_dir = dir;
    }
    if let Some(n) = concurrency {
        harvest.concurrency = n;
    }

    harvest.validate()?;
    Ok(harvest)
}

async fn cmd_run(
    config: &AppConfig,
    sources: &[String],
    out: Option<PathBuf>,
    concurrency: Option<u32>,
) -> Result<()> {
    let harvest = resolve_config(config, sources, out, concurrency)?;

    info!(
        sources = harvest.sources.len(),
        output_dir = %harvest.output_dir.display(),
        concurrency = harvest.concurrency,
        "starting harvest"
    );

    let reporter = CliProgress::new();
    let report = lotharvest_core::harvest_all(&harvest, &reporter).await?;
    reporter.finish();

    print_failures(&report);

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} sources failed",
            report.failed.len(),
            harvest.sources.len()
        ))
    }
}

fn print_failures(report: &HarvestReport) {
    for (source, error) in &report.failed {
        eprintln!("✗ {source}: {error}");
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress line printed after each page.
fn page_line(source: &Source, page: u32, lots: usize) -> String {
    format!("{source} → page {page}, got {lots} lots")
}

/// Summary line printed after each source's dataset is written.
fn summary_line(report: &SourceReport) -> String {
    format!(
        "✅ {} new lots added, {} updated ({} total) → {}",
        report.summary.added,
        report.summary.updated,
        report.summary.total,
        report.dataset.display()
    )
}

/// CLI progress reporter: a spinner on stderr for the current source, with
/// page and summary lines on stdout.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn source_started(&self, source: &Source) {
        self.spinner.set_message(format!("Harvesting {source}"));
    }

    fn page_fetched(&self, source: &Source, page: u32, lots: usize) {
        self.spinner
            .suspend(|| println!("{}", page_line(source, page, lots)));
    }

    fn source_merged(&self, report: &SourceReport) {
        self.spinner.suspend(|| println!("{}", summary_line(report)));
    }

    fn source_failed(&self, source: &Source, _error: &HarvestError) {
        self.spinner.set_message(format!("{source} failed"));
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
