//! arXiv export API client.
//!
//! Identifiers are looked up in batches through the Atom query endpoint; each
//! `<entry>` of the reply becomes a [`MetadataRecord`].

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::time::Duration;
use url::Url;

use crate::config::ArxivSettings;
use crate::models::{ArxivId, Author, DiagnosticKind, Diagnostics, MetadataRecord};
use crate::sources::SourceError;
use crate::utils::{validate_url, HttpClient};

/// Base URL for the arXiv export API
pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// Identifiers per API request unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// arXiv metadata source
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    api_url: Url,
    batch_size: usize,
    batch_delay: Duration,
}

impl ArxivSource {
    /// Create a source against `api_url` with default batching
    pub fn new(client: HttpClient, api_url: Url) -> Self {
        Self {
            client,
            api_url,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_secs(3),
        }
    }

    /// Create a source from the `[arxiv]` configuration section
    pub fn from_settings(client: HttpClient, settings: &ArxivSettings) -> Result<Self, SourceError> {
        let api_url = validate_url(&settings.api_url)
            .map_err(|e| SourceError::InvalidRequest(format!("arxiv.api_url: {}", e)))?;

        Ok(Self::new(client, api_url)
            .batch_size(settings.batch_size)
            .batch_delay(settings.batch_delay()))
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    /// Query URL for one batch of identifiers
    pub fn query_url(&self, batch: &[ArxivId]) -> Url {
        let id_list = batch
            .iter()
            .map(ArxivId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("id_list", &id_list)
            .append_pair("max_results", &batch.len().to_string());
        url
    }

    /// Fetch and parse the records for one batch
    pub async fn fetch_batch(
        &self,
        batch: &[ArxivId],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<MetadataRecord>, SourceError> {
        let url = self.query_url(batch);
        let body = self.client.get_text(&url, &[]).await?;
        parse_feed(&body, diagnostics)
    }

    /// Enrich `ids` batch by batch, in order.
    ///
    /// A failed batch aborts the whole lookup.
    pub async fn fetch_metadata(
        &self,
        ids: &[ArxivId],
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<MetadataRecord>, SourceError> {
        let total = ids.len().div_ceil(self.batch_size);
        let mut records = Vec::with_capacity(ids.len());

        for (index, batch) in ids.chunks(self.batch_size).enumerate() {
            let parsed = self.fetch_batch(batch, diagnostics).await?;
            tracing::info!(
                batch = index + 1,
                total,
                requested = batch.len(),
                received = parsed.len(),
                "Fetched metadata batch"
            );
            records.extend(parsed);

            tokio::time::sleep(self.batch_delay).await;
        }

        Ok(records)
    }
}

/// Fields collected for the entry being parsed
#[derive(Debug, Default)]
struct EntryState {
    id: Option<String>,
    record: MetadataRecord,
    published: Option<String>,
    updated: Option<String>,
}

/// Author being parsed
#[derive(Debug, Default)]
struct AuthorState {
    name: String,
    affiliations: Vec<String>,
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn get_attr(e: &BytesStart<'_>, attr_name: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == attr_name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn collapse_whitespace(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Apply the attributes of `<link>`, `<category>` and `<arxiv:primary_category>`
fn apply_attributes(e: &BytesStart<'_>, entry: &mut EntryState) {
    match local_name(e.local_name().as_ref()).as_str() {
        "link" => {
            let Some(href) = get_attr(e, "href") else {
                return;
            };
            let is_pdf = get_attr(e, "type").as_deref() == Some("application/pdf")
                || href.to_lowercase().ends_with(".pdf");

            if is_pdf {
                entry.record.pdf_url.get_or_insert(href);
            } else if href.contains("arxiv.org/abs/") {
                entry.record.abs_url.get_or_insert(href);
            }
        }
        "category" => {
            if let Some(term) = get_attr(e, "term").and_then(|t| non_empty(&t)) {
                if !entry.record.categories.contains(&term) {
                    entry.record.categories.push(term);
                }
            }
        }
        "primary_category" => {
            entry.record.primary_category = get_attr(e, "term").and_then(|t| non_empty(&t));
        }
        _ => {}
    }
}

fn parse_timestamp(
    value: Option<&str>,
    field: &str,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Option<DateTime<Utc>> {
    let value = value?;
    match DateTime::parse_from_rfc3339(value) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(e) => {
            diagnostics.push(
                DiagnosticKind::MalformedEntry,
                None,
                format!("Unparsable {} timestamp {:?} for {}: {}", field, value, label, e),
            );
            None
        }
    }
}

/// Turn a completed entry into a record, or `None` for API error entries
fn finish_entry(entry: EntryState, diagnostics: &mut Diagnostics) -> Option<MetadataRecord> {
    let EntryState {
        id,
        mut record,
        published,
        updated,
    } = entry;

    if let Some(id) = id.as_deref().filter(|id| id.contains("/api/errors")) {
        diagnostics.push(
            DiagnosticKind::MalformedEntry,
            None,
            format!(
                "API error entry {}: {}",
                id,
                record.r#abstract.as_deref().unwrap_or("no details")
            ),
        );
        return None;
    }

    record.identifier = id.as_deref().and_then(ArxivId::find_in);
    if record.identifier.is_none() {
        diagnostics.push(
            DiagnosticKind::MalformedEntry,
            None,
            format!(
                "No arXiv identifier in entry id {:?} ({})",
                id.as_deref().unwrap_or(""),
                record.label()
            ),
        );
    }

    let label = record.label().to_string();
    record.published = parse_timestamp(published.as_deref(), "published", &label, diagnostics);
    record.updated = parse_timestamp(updated.as_deref(), "updated", &label, diagnostics);

    Some(record)
}

/// Parse an Atom reply from the export API.
///
/// Malformed entries are kept when possible and reported into `diagnostics`;
/// only XML that cannot be read at all is an error.
pub fn parse_feed(
    xml: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<MetadataRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut entry: Option<EntryState> = None;
    let mut author: Option<AuthorState> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                text.clear();
                match local_name(e.local_name().as_ref()).as_str() {
                    "entry" => entry = Some(EntryState::default()),
                    "author" if entry.is_some() => author = Some(AuthorState::default()),
                    _ => {
                        if let Some(entry) = entry.as_mut() {
                            apply_attributes(e, entry);
                        }
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(entry) = entry.as_mut() {
                    apply_attributes(e, entry);
                }
            }
            Ok(Event::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|e| SourceError::Parse(format!("XML text: {}", e)))?;
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(ref e)) => {
                let name = local_name(e.local_name().as_ref());

                if name == "author" && author.is_some() {
                    if let (Some(done), Some(entry)) = (author.take(), entry.as_mut()) {
                        if !done.name.is_empty() {
                            let mut parsed = Author::new(done.name);
                            if !done.affiliations.is_empty() {
                                parsed = parsed.with_affiliation(done.affiliations.join(", "));
                            }
                            entry.record.authors.push(parsed);
                        }
                    }
                } else if let Some(current) = author.as_mut() {
                    match name.as_str() {
                        "name" => current.name = collapse_whitespace(&text).unwrap_or_default(),
                        "affiliation" => {
                            if let Some(affiliation) = collapse_whitespace(&text) {
                                current.affiliations.push(affiliation);
                            }
                        }
                        _ => {}
                    }
                } else if let Some(current) = entry.as_mut() {
                    match name.as_str() {
                        "id" => current.id = non_empty(&text),
                        "title" => current.record.title = collapse_whitespace(&text),
                        "summary" => current.record.r#abstract = collapse_whitespace(&text),
                        "published" => current.published = non_empty(&text),
                        "updated" => current.updated = non_empty(&text),
                        "comment" => current.record.comment = collapse_whitespace(&text),
                        "journal_ref" => current.record.journal_ref = collapse_whitespace(&text),
                        "doi" => current.record.doi = non_empty(&text),
                        "entry" => {
                            if let Some(done) = entry.take() {
                                records.extend(finish_entry(done, diagnostics));
                            }
                        }
                        _ => {}
                    }
                }

                text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SourceError::Parse(format!(
                    "XML parsing error at position {}: {}",
                    reader.error_position(),
                    e
                )));
            }
        }
    }

    Ok(records)
}
