//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`BIBHARVEST_<SECTION>__<KEY>`, e.g.
//! `BIBHARVEST_ARXIV__MAX_PAGES=3`), then command line flags applied by the
//! binary.

mod file_config;

pub use file_config::{find_config_file, write_default_config, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::{ItemType, RequiredField};
use crate::utils::RetryConfig;

/// Browser-like signature sent with every request
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP transport settings shared by every fetcher
    #[serde(default)]
    pub http: HttpSettings,

    /// arXiv full-text harvest
    #[serde(default)]
    pub arxiv: ArxivSettings,

    /// Zotero bibliography
    #[serde(default)]
    pub zotero: ZoteroSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; the n-th retry waits n times this long
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1500
}

/// arXiv full-text search and metadata enrichment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivSettings {
    /// Root of the full-text search interface; relative next links resolve against it
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Atom metadata API endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Full-text query (usually given on the command line)
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default = "default_csv_output")]
    pub output: PathBuf,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_delay")]
    pub batch_delay_ms: u64,

    /// Render search pages in headless Chromium
    #[serde(default)]
    pub render: bool,
}

impl Default for ArxivSettings {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            api_url: default_api_url(),
            query: None,
            output: default_csv_output(),
            max_pages: default_max_pages(),
            page_delay_ms: default_page_delay(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay(),
            render: false,
        }
    }
}

impl ArxivSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

fn default_search_url() -> String {
    "https://search.arxiv.org/".to_string()
}

fn default_api_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_csv_output() -> PathBuf {
    PathBuf::from("arxiv_fulltext_results.csv")
}

fn default_max_pages() -> usize {
    10
}

fn default_page_delay() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_delay() -> u64 {
    3000
}

/// Kind of Zotero library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LibraryType {
    Group,
    User,
}

impl LibraryType {
    /// Path segment used by the web API
    pub fn path_segment(&self) -> &'static str {
        match self {
            LibraryType::Group => "groups",
            LibraryType::User => "users",
        }
    }
}

/// A bibliography section listing only items carrying `tag`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSection {
    pub heading: String,
    pub tag: String,
}

impl TagSection {
    pub fn new(heading: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            tag: tag.into(),
        }
    }
}

impl FromStr for TagSection {
    type Err = String;

    /// Parses `HEADING=TAG`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((heading, tag)) if !heading.trim().is_empty() && !tag.trim().is_empty() => {
                Ok(TagSection::new(heading.trim(), tag.trim()))
            }
            _ => Err(format!("expected HEADING=TAG, got '{}'", s)),
        }
    }
}

/// Zotero listing and HTML bibliography settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoteroSettings {
    #[serde(default = "default_zotero_url")]
    pub api_url: String,

    #[serde(default = "default_library_type")]
    pub library_type: LibraryType,

    #[serde(default = "default_library_id")]
    pub library_id: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Unbounded when unset
    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default = "default_zotero_page_delay")]
    pub page_delay_ms: u64,

    #[serde(default = "default_excluded_types")]
    pub exclude_item_types: Vec<String>,

    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<RequiredField>,

    #[serde(default = "default_html_output")]
    pub output: PathBuf,

    #[serde(default = "default_document_title")]
    pub document_title: String,

    #[serde(default = "default_heading")]
    pub heading: String,

    #[serde(default = "default_sections")]
    pub sections: Vec<TagSection>,
}

impl Default for ZoteroSettings {
    fn default() -> Self {
        Self {
            api_url: default_zotero_url(),
            library_type: default_library_type(),
            library_id: default_library_id(),
            page_size: default_page_size(),
            max_pages: None,
            page_delay_ms: default_zotero_page_delay(),
            exclude_item_types: default_excluded_types(),
            required_fields: default_required_fields(),
            output: default_html_output(),
            document_title: default_document_title(),
            heading: default_heading(),
            sections: default_sections(),
        }
    }
}

impl ZoteroSettings {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn excluded_types(&self) -> Vec<ItemType> {
        self.exclude_item_types
            .iter()
            .map(|t| ItemType::from(t.as_str()))
            .collect()
    }
}

fn default_zotero_url() -> String {
    "https://api.zotero.org".to_string()
}

fn default_library_type() -> LibraryType {
    LibraryType::Group
}

fn default_library_id() -> String {
    "5693788".to_string()
}

fn default_page_size() -> usize {
    100 // Zotero's maximum
}

fn default_zotero_page_delay() -> u64 {
    250
}

fn default_excluded_types() -> Vec<String> {
    vec!["attachment".to_string(), "note".to_string()]
}

fn default_required_fields() -> Vec<RequiredField> {
    vec![
        RequiredField::Title,
        RequiredField::Creators,
        RequiredField::Date,
    ]
}

fn default_html_output() -> PathBuf {
    PathBuf::from("bibliography.html")
}

fn default_document_title() -> String {
    "Bibliography".to_string()
}

fn default_heading() -> String {
    "Center for Quantum Science Publications".to_string()
}

fn default_sections() -> Vec<TagSection> {
    vec![
        TagSection::new("QUSP-only", "QUSP FOR5413"),
        TagSection::new("CoQuaDis-only", "Quantera Project CoQuaDis"),
    ]
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from `path` (if any) and `BIBHARVEST_*` variables.
///
/// Anything neither source sets falls back to the serde defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("BIBHARVEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
