//! Zotero web API client.
//!
//! Library listings are paginated by offset: `limit` items starting at
//! `start`, until a page comes back empty or the page cap is reached.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::config::{LibraryType, ZoteroSettings};
use crate::models::{BibliographyItem, Creator, DiagnosticKind, Diagnostics, FetchedItem, ItemType};
use crate::sources::SourceError;
use crate::utils::{validate_url, HttpClient};

/// Base URL for the Zotero web API
pub const ZOTERO_API_URL: &str = "https://api.zotero.org";

/// Largest page the API serves
pub const MAX_PAGE_SIZE: usize = 100;

const API_VERSION_HEADER: (&str, &str) = ("Zotero-API-Version", "3");

/// Zotero library source
#[derive(Debug, Clone)]
pub struct ZoteroSource {
    client: HttpClient,
    api_url: Url,
    library_type: LibraryType,
    library_id: String,
    page_size: usize,
    max_pages: Option<usize>,
    page_delay: Duration,
}

impl ZoteroSource {
    /// Create a source for one library with default paging
    pub fn new(
        client: HttpClient,
        api_url: Url,
        library_type: LibraryType,
        library_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url,
            library_type,
            library_id: library_id.into(),
            page_size: MAX_PAGE_SIZE,
            max_pages: None,
            page_delay: Duration::from_millis(250),
        }
    }

    /// Create a source from the `[zotero]` configuration section
    pub fn from_settings(
        client: HttpClient,
        settings: &ZoteroSettings,
    ) -> Result<Self, SourceError> {
        let api_url = validate_url(&settings.api_url)
            .map_err(|e| SourceError::InvalidRequest(format!("zotero.api_url: {}", e)))?;

        let library_id = settings.library_id.trim();
        if library_id.is_empty() || !library_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(SourceError::InvalidRequest(format!(
                "zotero.library_id must be numeric, got {:?}",
                settings.library_id
            )));
        }

        Ok(Self::new(client, api_url, settings.library_type, library_id)
            .page_size(settings.page_size)
            .max_pages(settings.max_pages)
            .page_delay(settings.page_delay()))
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Listing URL for the page starting at offset `start`
    pub fn page_url(&self, start: usize) -> Result<Url, SourceError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidRequest(format!("{} cannot be a base URL", self.api_url)))?
            .pop_if_empty()
            .extend([
                self.library_type.path_segment(),
                self.library_id.as_str(),
                "items",
            ]);

        url.query_pairs_mut()
            .append_pair("format", "json")
            .append_pair("include", "data")
            .append_pair("sort", "date")
            .append_pair("direction", "desc")
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("start", &start.to_string());

        Ok(url)
    }

    /// Fetch one page of raw items
    pub async fn fetch_page(&self, start: usize) -> Result<Vec<Value>, SourceError> {
        let url = self.page_url(start)?;
        let body = self.client.get_text(&url, &[API_VERSION_HEADER]).await?;

        serde_json::from_str::<Vec<Value>>(&body)
            .map_err(|e| SourceError::Parse(format!("Expected a JSON array of items from {}: {}", url, e)))
    }

    /// Fetch every raw item of the library in listing order
    pub async fn fetch_all(&self) -> Result<Vec<Value>, SourceError> {
        let mut items = Vec::new();
        let mut page = 0;

        loop {
            if self.max_pages.is_some_and(|cap| page >= cap) {
                tracing::info!("Reached page cap of {}", page);
                break;
            }
            if page > 0 {
                tokio::time::sleep(self.page_delay).await;
            }

            let start = page * self.page_size;
            let batch = self.fetch_page(start).await?;
            page += 1;

            tracing::info!(page, start, received = batch.len(), "Fetched library page");

            if batch.is_empty() {
                break;
            }
            items.extend(batch);
        }

        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(default)]
    key: Option<String>,
    data: RawItemData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItemData {
    item_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    creators: Vec<RawCreator>,
    #[serde(default, rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default, rename = "archiveID")]
    archive_id: Option<String>,
    #[serde(default)]
    journal_abbreviation: Option<String>,
    #[serde(default)]
    volume: Option<String>,
    #[serde(default)]
    pages: Option<String>,
    #[serde(default)]
    tags: Vec<RawTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCreator {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTag {
    tag: String,
}

/// Blank strings count as absent
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawCreator {
    fn into_creator(self) -> Option<Creator> {
        if let Some(name) = present(self.name) {
            return Some(Creator::Single(name));
        }
        let last_name = present(self.last_name)?;
        Some(Creator::person(self.first_name.unwrap_or_default(), last_name))
    }
}

impl From<RawItem> for BibliographyItem {
    fn from(raw: RawItem) -> Self {
        let data = raw.data;

        BibliographyItem {
            key: present(raw.key),
            item_type: ItemType::from(data.item_type.as_str()),
            title: present(data.title),
            date: present(data.date),
            creators: data
                .creators
                .into_iter()
                .filter_map(RawCreator::into_creator)
                .collect(),
            doi: present(data.doi),
            repository: present(data.repository),
            archive_id: present(data.archive_id),
            journal_abbreviation: present(data.journal_abbreviation),
            volume: present(data.volume),
            pages: present(data.pages),
            tags: data
                .tags
                .into_iter()
                .map(|t| t.tag)
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Decode raw listing items, keeping their fetch position.
///
/// Items that do not match the item schema are reported and skipped.
pub fn decode_items(raw_items: Vec<Value>, diagnostics: &mut Diagnostics) -> Vec<FetchedItem> {
    raw_items
        .into_iter()
        .enumerate()
        .filter_map(|(position, raw)| {
            match serde_json::from_value::<RawItem>(raw.clone()) {
                Ok(decoded) => Some(FetchedItem {
                    position,
                    raw,
                    item: decoded.into(),
                }),
                Err(e) => {
                    diagnostics.push(
                        DiagnosticKind::MalformedEntry,
                        Some(position),
                        format!("Undecodable item ({}): {}", e, raw),
                    );
                    None
                }
            }
        })
        .collect()
}
