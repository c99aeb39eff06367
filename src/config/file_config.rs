//! Configuration file discovery and generation.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! user_agent = "Mozilla/5.0 ..."
//! timeout_seconds = 30
//! max_attempts = 3
//! retry_base_delay_ms = 1500
//!
//! [arxiv]
//! search_url = "https://search.arxiv.org/"
//! api_url = "http://export.arxiv.org/api/query"
//! output = "arxiv_fulltext_results.csv"
//! max_pages = 10
//! page_delay_ms = 1000
//! batch_size = 50
//! batch_delay_ms = 3000
//! render = false
//!
//! [zotero]
//! library_type = "group"
//! library_id = "5693788"
//! exclude_item_types = ["attachment", "note"]
//! required_fields = ["title", "creators", "date"]
//! output = "bibliography.html"
//!
//! [[zotero.sections]]
//! heading = "QUSP-only"
//! tag = "QUSP FOR5413"
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// Name looked up in the working directory
const LOCAL_CONFIG_NAME: &str = "bibharvest.toml";

/// Find a configuration file: `./bibharvest.toml`, then `<config dir>/bibharvest/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("bibharvest").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Write the default configuration as TOML
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigFileError> {
    if path.exists() && !force {
        return Err(ConfigFileError::Exists(path.to_path_buf()));
    }

    let content = toml::to_string_pretty(&Config::default())
        .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    Exists(PathBuf),
}
