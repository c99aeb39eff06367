//! CSV export of enriched arXiv records.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;

use super::{write_atomic, ExportError};
use crate::models::MetadataRecord;

/// Column order of the export
pub const CSV_HEADER: [&str; 13] = [
    "identifier",
    "title",
    "abstract",
    "published",
    "updated",
    "authors",
    "primary_category",
    "categories",
    "doi",
    "pdf_url",
    "abs_url",
    "comment",
    "journal_ref",
];

/// One flattened CSV row; `None` becomes an empty cell
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    identifier: Option<&'a str>,
    title: Option<&'a str>,
    r#abstract: Option<&'a str>,
    published: Option<String>,
    updated: Option<String>,
    authors: String,
    primary_category: Option<&'a str>,
    categories: String,
    doi: Option<&'a str>,
    pdf_url: Option<&'a str>,
    abs_url: Option<&'a str>,
    comment: Option<&'a str>,
    journal_ref: Option<&'a str>,
}

fn timestamp(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl<'a> From<&'a MetadataRecord> for CsvRow<'a> {
    fn from(record: &'a MetadataRecord) -> Self {
        CsvRow {
            identifier: record.identifier.as_ref().map(|id| id.as_str()),
            title: record.title.as_deref(),
            r#abstract: record.r#abstract.as_deref(),
            published: timestamp(record.published.as_ref()),
            updated: timestamp(record.updated.as_ref()),
            authors: record.authors_joined(),
            primary_category: record.primary_category.as_deref(),
            categories: record.categories_joined(),
            doi: record.doi.as_deref(),
            pdf_url: record.pdf_url.as_deref(),
            abs_url: record.abs_url.as_deref(),
            comment: record.comment.as_deref(),
            journal_ref: record.journal_ref.as_deref(),
        }
    }
}

/// Encode `records` as CSV, header first, rows in the given order
pub fn to_csv_bytes(records: &[MetadataRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Csv(e.into_error().into()))
}

/// Write `records` to `path` as CSV
pub fn save_csv(path: &Path, records: &[MetadataRecord]) -> Result<(), ExportError> {
    let bytes = to_csv_bytes(records)?;
    write_atomic(path, &bytes)?;
    tracing::info!(path = %path.display(), rows = records.len(), "Saved CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArxivId, Author};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn record() -> MetadataRecord {
        MetadataRecord {
            identifier: ArxivId::parse("2101.01234"),
            title: Some("Walks, \"quoted\"".to_string()),
            r#abstract: Some("Abstract.".to_string()),
            published: Some(Utc.with_ymd_and_hms(2021, 1, 4, 18, 0, 0).unwrap()),
            updated: None,
            authors: vec![
                Author::new("Ada Lovelace").with_affiliation("Engines"),
                Author::new("Charles Babbage"),
            ],
            primary_category: Some("quant-ph".to_string()),
            categories: vec!["quant-ph".to_string(), "math.CO".to_string()],
            doi: None,
            pdf_url: Some("http://arxiv.org/pdf/2101.01234v1".to_string()),
            abs_url: Some("http://arxiv.org/abs/2101.01234v1".to_string()),
            comment: None,
            journal_ref: None,
        }
    }

    #[test]
    fn test_header_only_for_no_records() {
        let bytes = to_csv_bytes(&[]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "identifier,title,abstract,published,updated,authors,primary_category,categories,doi,pdf_url,abs_url,comment,journal_ref\n"
        );
    }

    #[test]
    fn test_row_formatting() {
        let bytes = to_csv_bytes(&[record()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let row = text.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "2101.01234,\"Walks, \"\"quoted\"\"\",Abstract.,2021-01-04T18:00:00Z,,\
             Ada Lovelace (Engines); Charles Babbage,quant-ph,\"quant-ph, math.CO\",,\
             http://arxiv.org/pdf/2101.01234v1,http://arxiv.org/abs/2101.01234v1,,"
        );
    }

    #[test]
    fn test_save_csv_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let records = vec![record(), MetadataRecord::default()];

        save_csv(&path, &records).unwrap();

        let mut reader = ::csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());

        let rows: Vec<::csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "2101.01234");
        assert!(rows[1].iter().all(|cell| cell.is_empty()));
    }
}
