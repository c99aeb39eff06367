//! Remote sources the pipelines harvest from.
//!
//! - [`arxiv_search`]: the full-text search pages, walked by following "next" links
//! - [`arxiv`]: the Atom export API, queried in batches of identifiers
//! - [`zotero`]: the Zotero web API, walked by offset
//!
//! Search pages are retrieved through the [`PageFetcher`] trait so the crawl
//! can run against plain HTTP or, with the `render` feature, against a
//! headless Chromium session for pages that need JavaScript.
//!
//! # Feature Flags
//!
//! - `render` - Enable the Chromium-backed [`PageFetcher`] (default: disabled)

pub mod arxiv;
pub mod arxiv_search;
pub mod mock;
#[cfg(feature = "render")]
mod render;
pub mod zotero;

pub use arxiv::ArxivSource;
pub use arxiv_search::{collect_identifiers, HttpPageFetcher};
pub use mock::MockPageFetcher;
#[cfg(feature = "render")]
pub use render::ChromiumPageFetcher;
pub use zotero::ZoteroSource;

use async_trait::async_trait;
use url::Url;

/// A retrieved page and the pagination link discovered in it
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Where the page was retrieved from; relative links resolve against it
    pub url: Url,
    pub body: String,
    pub next: Option<Url>,
}

/// Retrieves search result pages.
///
/// Implementations must apply the same next-link heuristics so a crawl
/// behaves identically whichever fetcher backs it.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the page at `url`
    async fn fetch_page(&self, url: &Url) -> Result<FetchedPage, SourceError>;

    /// Release any resources held by the fetcher
    async fn close(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Open a headless Chromium fetcher
#[cfg(feature = "render")]
pub async fn open_renderer(
    root: Url,
    user_agent: &str,
) -> Result<Box<dyn PageFetcher>, SourceError> {
    Ok(Box::new(ChromiumPageFetcher::launch(root, user_agent).await?))
}

/// Open a headless Chromium fetcher
#[cfg(not(feature = "render"))]
pub async fn open_renderer(
    _root: Url,
    _user_agent: &str,
) -> Result<Box<dyn PageFetcher>, SourceError> {
    Err(SourceError::Render(
        "rendering requested but bibharvest was built without the `render` feature".to_string(),
    ))
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Parsing error (XML, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Headless browser failure
    #[error("Render error: {0}")]
    Render(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
