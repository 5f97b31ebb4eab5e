//! Configuration management.
//!
//! Settings come from an optional TOML file overlaid with environment
//! variables prefixed `PAPERS_DL`, using `__` between section and key:
//!
//! ```toml
//! [http]
//! user_agent = "Mozilla/5.0"
//! timeout_secs = 30
//!
//! [scihub]
//! discovery_url = "https://sci-hub.now.sh/"
//! mirrors = ["https://sci-hub.se"]
//! max_attempts = 20
//!
//! [scidb]
//! base_url = "https://annas-archive.org/scidb/"
//!
//! [downloads]
//! default_path = "./papers"
//! ```
//!
//! e.g. `PAPERS_DL_HTTP__TIMEOUT_SECS=60` or `PAPERS_DL_SCIHUB__MIRRORS=https://a,https://b`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::RetryConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PAPERS_DL";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Mirror-rotating source settings
    #[serde(default)]
    pub scihub: SciHubConfig,

    /// Single-endpoint source settings
    #[serde(default)]
    pub scidb: SciDbConfig,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadsConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent for outbound requests; a browser-like default is used if unset
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Sci-Hub configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SciHubConfig {
    /// Page listing the currently known mirrors
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,

    /// Fixed mirror list; discovery is skipped when non-empty
    #[serde(default)]
    pub mirrors: Vec<String>,

    /// Fetch attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the random wait between attempts
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,

    /// Upper bound of the random wait between attempts
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for SciHubConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            mirrors: Vec::new(),
            max_attempts: default_max_attempts(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

impl SciHubConfig {
    /// Retry policy for fetch attempts
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(self.max_attempts)
            .wait_between(
                Duration::from_millis(self.min_wait_ms),
                Duration::from_millis(self.max_wait_ms),
            )
    }
}

fn default_discovery_url() -> String {
    "https://sci-hub.now.sh/".to_string()
}

fn default_max_attempts() -> u32 {
    20
}

fn default_min_wait_ms() -> u64 {
    100
}

fn default_max_wait_ms() -> u64 {
    1000
}

/// SciDB configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SciDbConfig {
    /// Base URL; the DOI is appended verbatim
    #[serde(default = "default_scidb_url")]
    pub base_url: String,
}

impl Default for SciDbConfig {
    fn default() -> Self {
        Self {
            base_url: default_scidb_url(),
        }
    }
}

fn default_scidb_url() -> String {
    "https://annas-archive.org/scidb/".to_string()
}

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Default output directory
    #[serde(default = "default_download_dir")]
    pub default_path: PathBuf,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Configuration from environment variables and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    builder().add_source(environment()).build()?.try_deserialize()
}

fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
    config::Config::builder()
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("scihub.mirrors")
        .try_parsing(true)
}

/// Look for a config file in the usual places
///
/// Checks `./papers-dl.toml`, then `<config dir>/papers-dl/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("papers-dl.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("papers-dl").join("config.toml"))
        .filter(|path| path.is_file())
}
