//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `PAPER_MESH_` (nested keys use `__`,
//! e.g. `PAPER_MESH_CITATION__BACKOFF_BASE_MS=500`).
//!
//! ```toml
//! [api_keys]
//! semantic_scholar = "your-api-key"
//!
//! [sources]
//! mailto = "you@example.org"
//! max_results_per_provider = 50
//!
//! [dedup]
//! title_distance_threshold = 3
//!
//! [citation]
//! max_attempts = 3
//! backoff_base_ms = 1500
//! inter_request_pause_ms = 350
//! reference_limit = 30
//! citation_limit = 20
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [logging]
//! level = "info"
//! format = "pretty"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::ThrottlePolicy;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "PAPER_MESH";

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "paper-mesh.toml";

const SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org/graph/v1";
const OPENALEX_URL: &str = "https://api.openalex.org";
const CROSSREF_URL: &str = "https://api.crossref.org";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub citation: CitationConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Fill unset values from the conventional environment variables
    pub fn with_env_fallbacks(mut self) -> Self {
        if self.api_keys.semantic_scholar.is_none() {
            self.api_keys.semantic_scholar = std::env::var("SEMANTIC_SCHOLAR_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if self.sources.mailto.is_none() {
            self.sources.mailto = ["OPENALEX_EMAIL", "PAPER_MESH_MAILTO"]
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|m| !m.trim().is_empty());
        }
        self
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Semantic Scholar API key (optional, for higher rate limits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_scholar: Option<String>,
}

/// Search catalog settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Contact address sent to OpenAlex and Crossref for their polite pools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mailto: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results_per_provider: usize,

    #[serde(default = "default_semantic_url")]
    pub semantic_scholar_url: String,

    #[serde(default = "default_openalex_url")]
    pub openalex_url: String,

    #[serde(default = "default_crossref_url")]
    pub crossref_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mailto: None,
            max_results_per_provider: default_max_results(),
            semantic_scholar_url: default_semantic_url(),
            openalex_url: default_openalex_url(),
            crossref_url: default_crossref_url(),
        }
    }
}

fn default_max_results() -> usize {
    crate::models::DEFAULT_MAX_RESULTS
}

fn default_semantic_url() -> String {
    SEMANTIC_SCHOLAR_URL.to_string()
}

fn default_openalex_url() -> String {
    OPENALEX_URL.to_string()
}

fn default_crossref_url() -> String {
    CROSSREF_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Normalized titles closer than this edit distance are duplicates
    #[serde(default = "default_title_distance")]
    pub title_distance_threshold: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_distance_threshold: default_title_distance(),
        }
    }
}

fn default_title_distance() -> usize {
    crate::utils::DEFAULT_TITLE_DISTANCE
}

/// Citation graph API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationConfig {
    #[serde(default = "default_semantic_url")]
    pub base_url: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Pause between the detail, references and citations calls
    #[serde(default = "default_inter_request_pause_ms")]
    pub inter_request_pause_ms: u64,

    #[serde(default = "default_reference_limit")]
    pub reference_limit: usize,

    #[serde(default = "default_citation_limit")]
    pub citation_limit: usize,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            base_url: default_semantic_url(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            inter_request_pause_ms: default_inter_request_pause_ms(),
            reference_limit: default_reference_limit(),
            citation_limit: default_citation_limit(),
        }
    }
}

impl CitationConfig {
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        ThrottlePolicy::new(self.max_attempts, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn inter_request_pause(&self) -> Duration {
        Duration::from_millis(self.inter_request_pause_ms)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1500
}

fn default_inter_request_pause_ms() -> u64 {
    350
}

fn default_reference_limit() -> usize {
    30
}

fn default_citation_limit() -> usize {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Locate a configuration file: `./paper-mesh.toml`, then the user config dir
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("paper-mesh").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: Config = settings.try_deserialize()?;
    Ok(config.with_env_fallbacks())
}
