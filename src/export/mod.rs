//! Output writers for harvested data.
//!
//! - [`csv`]: one row per enriched arXiv record
//! - [`html`]: the Zotero bibliography page
//!
//! Both write atomically: the document is produced in full, written to a
//! temporary file next to the target and then persisted over it.

pub mod csv;
pub mod html;

pub use self::csv::{save_csv, to_csv_bytes, CSV_HEADER};
pub use self::html::{render_document, render_entries, render_entry, save_html, HtmlLayout, RenderedEntry};

use std::io::Write;
use std::path::Path;

/// Errors raised while writing output files
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Replace `path` with `contents` without ever exposing a partial file
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| ExportError::io(path, e))?;
    file.write_all(contents)
        .and_then(|_| file.flush())
        .map_err(|e| ExportError::io(path, e))?;
    file.persist(path)
        .map_err(|e| ExportError::io(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote output file");
    Ok(())
}
