//! HTML bibliography rendering.
//!
//! Every item is rendered exactly once; sections reuse the rendered markup so
//! trailer diagnostics are reported once per item no matter how many sections
//! list it. Item text is emitted as stored in the library, since Zotero titles
//! may carry inline markup such as `<i>` or `<sub>`.

use std::path::Path;

use super::{write_atomic, ExportError};
use crate::config::{TagSection, ZoteroSettings};
use crate::models::{BibliographyItem, Creator, DiagnosticKind, Diagnostics, FetchedItem, ItemType};

/// Page title, heading and tag sections of the document
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlLayout {
    pub title: String,
    pub heading: String,
    pub sections: Vec<TagSection>,
}

impl From<&ZoteroSettings> for HtmlLayout {
    fn from(settings: &ZoteroSettings) -> Self {
        Self {
            title: settings.document_title.clone(),
            heading: settings.heading.clone(),
            sections: settings.sections.clone(),
        }
    }
}

/// An item and its rendered `<li>`
#[derive(Debug, Clone)]
pub struct RenderedEntry<'a> {
    pub item: &'a BibliographyItem,
    pub html: String,
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn trailer(item: &BibliographyItem, position: Option<usize>, diagnostics: &mut Diagnostics) -> String {
    let mut trailer = String::new();

    match item.item_type {
        ItemType::Preprint => match (&item.repository, &item.archive_id) {
            (Some(repository), Some(archive_id)) => {
                trailer.push_str(&format!("{}{} ", repository, archive_id));
            }
            _ => diagnostics.push(
                DiagnosticKind::MissingTrailer,
                position,
                format!("No repository or archive ID for {}", item.label()),
            ),
        },
        ItemType::JournalArticle => {
            match (&item.journal_abbreviation, &item.volume) {
                (Some(journal), Some(volume)) => {
                    trailer.push_str(&format!("{} Vol. {}, ", journal, volume));
                }
                _ => diagnostics.push(
                    DiagnosticKind::MissingTrailer,
                    position,
                    format!("No journal abbreviation or volume for {}", item.label()),
                ),
            }
            match &item.pages {
                Some(pages) => {
                    trailer.push_str(pages);
                    trailer.push(' ');
                }
                None => diagnostics.push(
                    DiagnosticKind::MissingTrailer,
                    position,
                    format!("No pages for {}", item.label()),
                ),
            }
        }
        _ => {}
    }

    trailer
}

/// Render one item as an `<li>` element
pub fn render_entry(
    item: &BibliographyItem,
    position: Option<usize>,
    diagnostics: &mut Diagnostics,
) -> String {
    let creators = item
        .creators
        .iter()
        .map(Creator::short_name)
        .collect::<Vec<_>>()
        .join(", ");

    let mut citation = trailer(item, position, diagnostics);
    match item.year() {
        Some(year) => citation.push_str(&format!("({})", year)),
        None => citation.truncate(citation.trim_end().len()),
    }

    let mut html = format!("<li>{}<br><strong>", creators);
    if let Some(title) = &item.title {
        html.push_str(&format!("{}.<br>", title));
    }
    match &item.doi {
        Some(doi) => {
            html.push_str(&format!(
                "<a href=\"https://doi.org/{}\" target=\"_blank\" rel=\"noreferrer\">{}</a>",
                escape(doi),
                citation
            ));
        }
        None => html.push_str(&citation),
    }
    html.push_str("</strong></li>");

    html
}

/// Render every item once, in fetch order
pub fn render_entries<'a>(
    items: &'a [FetchedItem],
    diagnostics: &mut Diagnostics,
) -> Vec<RenderedEntry<'a>> {
    items
        .iter()
        .map(|fetched| RenderedEntry {
            item: &fetched.item,
            html: render_entry(&fetched.item, Some(fetched.position), diagnostics),
        })
        .collect()
}

fn push_list<'a>(document: &mut String, entries: impl Iterator<Item = &'a RenderedEntry<'a>>) {
    document.push_str("<ul>\n");
    for entry in entries {
        document.push_str(&entry.html);
        document.push('\n');
    }
    document.push_str("</ul>\n");
}

/// Assemble the full page: all items, then one list per tag section
pub fn render_document(layout: &HtmlLayout, entries: &[RenderedEntry<'_>]) -> String {
    let mut document = format!(
        "<!DOCTYPE html>\n<html lang=\"en-US\">\n<head>\n    <meta charset=\"UTF-8\">\n    <title>{}</title>\n</head>\n<body>\n    <h1>{}</h1>\n",
        escape(&layout.title),
        escape(&layout.heading)
    );

    push_list(&mut document, entries.iter());

    for section in &layout.sections {
        document.push_str(&format!("<h2>{}</h2>\n", escape(&section.heading)));
        push_list(
            &mut document,
            entries.iter().filter(|e| e.item.has_tag(&section.tag)),
        );
    }

    document.push_str("</body>\n</html>\n");
    document
}

/// Render `items` and write the page to `path`
pub fn save_html(
    path: &Path,
    layout: &HtmlLayout,
    items: &[FetchedItem],
    diagnostics: &mut Diagnostics,
) -> Result<(), ExportError> {
    let entries = render_entries(items, diagnostics);
    let document = render_document(layout, &entries);
    write_atomic(path, document.as_bytes())?;
    tracing::info!(path = %path.display(), entries = entries.len(), "Saved bibliography");
    Ok(())
}
