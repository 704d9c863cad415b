//! Application configuration for LotHarvest.
//!
//! User config lives at `~/.lotharvest/lotharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};
use crate::types::Source;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lotharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lotharvest";

/// Auction houses harvested when no sources are configured.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://auctions.bassanis.co.za",
    "https://auction.vintageauctions.co.za",
    "https://bid.ewaan.co.za",
];

// ---------------------------------------------------------------------------
// Config structs (matching lotharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Auction houses to harvest, in order.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            sources: default_sources(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding the `{host}_lots.json` datasets.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Pages requested together in one window.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// `limit` query parameter sent with every page request.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent to sources.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_concurrency() -> u32 {
    10
}
fn default_page_limit() -> u32 {
    2000
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    "Mozilla/5.0".into()
}
fn default_sources() -> Vec<SourceEntry> {
    DEFAULT_SOURCES
        .iter()
        .map(|base| SourceEntry {
            base_url: (*base).to_string(),
        })
        .collect()
}

/// `[[sources]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Base URL of the auction house, e.g. `https://bid.example.com`.
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// Harvest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime harvest configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Sources in processing order.
    pub sources: Vec<Source>,
    /// Directory for dataset files.
    pub output_dir: PathBuf,
    /// Pages per window.
    pub concurrency: u32,
    /// Listings requested per page.
    pub page_limit: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl HarvestConfig {
    /// Dataset path for a source: `{output_dir}/{host}_lots.json`.
    pub fn dataset_path(&self, source: &Source) -> PathBuf {
        self.output_dir.join(source.dataset_file_name())
    }

    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HarvestError::config("concurrency must be at least 1"));
        }
        if self.page_limit == 0 {
            return Err(HarvestError::config("page_limit must be at least 1"));
        }
        if self.sources.is_empty() {
            return Err(HarvestError::config("no sources configured"));
        }
        Ok(())
    }
}

impl TryFrom<&AppConfig> for HarvestConfig {
    type Error = HarvestError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|entry| Source::parse(&entry.base_url))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sources,
            output_dir: PathBuf::from(&config.defaults.output_dir),
            concurrency: config.defaults.concurrency,
            page_limit: config.defaults.page_limit,
            timeout: Duration::from_secs(config.defaults.timeout_secs),
            user_agent: config.defaults.user_agent.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lotharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lotharvest/lotharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
