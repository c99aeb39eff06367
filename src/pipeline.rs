//! End-to-end runs: fetch, normalize, export.
//!
//! Each run is an explicit value built from [`Config`] and consumed by `run`,
//! which returns a [`RunReport`] with the advisory diagnostics collected on
//! the way. Fatal faults abort the run before anything is written.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::export::{save_csv, save_html, ExportError, HtmlLayout};
use crate::models::{Diagnostics, ItemType, RequiredField};
use crate::sources::arxiv_search::search_url;
use crate::sources::zotero::decode_items;
use crate::sources::{
    collect_identifiers, open_renderer, ArxivSource, HttpPageFetcher, PageFetcher, SourceError,
    ZoteroSource,
};
use crate::utils::{check_required_fields, filter_excluded, scan_titles, validate_url, HttpClient};

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("no search query given (use --query or set arxiv.query)")]
    MissingQuery,
}

/// Outcome of a completed run
#[derive(Debug)]
pub struct RunReport {
    /// File that was written
    pub output: PathBuf,
    /// Rows or entries written
    pub records: usize,
    pub diagnostics: Diagnostics,
}

/// arXiv full-text harvest: crawl search pages, enrich, write CSV
pub struct ArxivRun {
    fetcher: Box<dyn PageFetcher>,
    start: Url,
    max_pages: usize,
    page_delay: Duration,
    source: ArxivSource,
    output: PathBuf,
}

impl ArxivRun {
    /// Assemble a run from explicit parts
    pub fn new(
        fetcher: Box<dyn PageFetcher>,
        start: Url,
        source: ArxivSource,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            start,
            max_pages: 10,
            page_delay: Duration::from_secs(1),
            source,
            output: output.into(),
        }
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Build a run from configuration, opening a browser session if rendering is enabled
    pub async fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let settings = &config.arxiv;
        let query = settings
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or(PipelineError::MissingQuery)?;

        let client = HttpClient::with_settings(&config.http)?;
        let root = validate_url(&settings.search_url)
            .map_err(|e| SourceError::InvalidRequest(format!("arxiv.search_url: {}", e)))?;
        let source = ArxivSource::from_settings(client.clone(), settings)?;

        let fetcher: Box<dyn PageFetcher> = if settings.render {
            open_renderer(root.clone(), &config.http.user_agent).await?
        } else {
            Box::new(HttpPageFetcher::new(client, root.clone()))
        };

        Ok(Self::new(fetcher, search_url(&root, query), source, &settings.output)
            .max_pages(settings.max_pages)
            .page_delay(settings.page_delay()))
    }

    pub async fn run(self) -> Result<RunReport, PipelineError> {
        tracing::info!(start = %self.start, max_pages = self.max_pages, "Crawling search results");

        let crawl =
            collect_identifiers(self.fetcher.as_ref(), self.start, self.max_pages, self.page_delay)
                .await;
        // The fetcher may own a browser process; release it on every path.
        let closed = self.fetcher.close().await;
        let ids = match crawl {
            Ok(ids) => {
                closed?;
                ids
            }
            Err(e) => {
                if let Err(close_error) = closed {
                    tracing::warn!(error = %close_error, "Failed to close page fetcher");
                }
                return Err(e.into());
            }
        };

        tracing::info!(count = ids.len(), "Collected identifiers");

        let mut diagnostics = Diagnostics::new();
        let records = self.source.fetch_metadata(&ids, &mut diagnostics).await?;
        save_csv(&self.output, &records)?;

        Ok(RunReport {
            output: self.output,
            records: records.len(),
            diagnostics,
        })
    }
}

/// Zotero bibliography: fetch the library, check items, write HTML
pub struct ZoteroRun {
    source: ZoteroSource,
    excluded: Vec<ItemType>,
    required: Vec<RequiredField>,
    layout: HtmlLayout,
    output: PathBuf,
}

impl ZoteroRun {
    pub fn new(source: ZoteroSource, layout: HtmlLayout, output: impl Into<PathBuf>) -> Self {
        Self {
            source,
            excluded: vec![ItemType::Attachment, ItemType::Note],
            required: vec![RequiredField::Title, RequiredField::Creators, RequiredField::Date],
            layout,
            output: output.into(),
        }
    }

    pub fn excluded(mut self, excluded: Vec<ItemType>) -> Self {
        self.excluded = excluded;
        self
    }

    pub fn required(mut self, required: Vec<RequiredField>) -> Self {
        self.required = required;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let settings = &config.zotero;
        let client = HttpClient::with_settings(&config.http)?;
        let source = ZoteroSource::from_settings(client, settings)?;

        Ok(Self::new(source, HtmlLayout::from(settings), &settings.output)
            .excluded(settings.excluded_types())
            .required(settings.required_fields.clone()))
    }

    pub async fn run(self) -> Result<RunReport, PipelineError> {
        let raw = self.source.fetch_all().await?;
        tracing::info!(count = raw.len(), "Fetched library items");

        let mut diagnostics = Diagnostics::new();
        let items = decode_items(raw, &mut diagnostics);
        let items = filter_excluded(items, &self.excluded, &mut diagnostics);
        check_required_fields(&items, &self.required, &mut diagnostics);
        scan_titles(&items, &mut diagnostics);

        save_html(&self.output, &self.layout, &items, &mut diagnostics)?;

        Ok(RunReport {
            output: self.output,
            records: items.len(),
            diagnostics,
        })
    }
}

/// Run the arXiv harvest described by `config`
pub async fn run_arxiv(config: &Config) -> Result<RunReport, PipelineError> {
    ArxivRun::from_config(config).await?.run().await
}

/// Run the Zotero bibliography described by `config`
pub async fn run_zotero(config: &Config) -> Result<RunReport, PipelineError> {
    ZoteroRun::from_config(config)?.run().await
}
