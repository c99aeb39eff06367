//! Metadata record built from the arXiv Atom feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArxivId;

/// An author with an optional affiliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }

    pub fn with_affiliation(mut self, affiliation: impl Into<String>) -> Self {
        self.affiliation = Some(affiliation.into());
        self
    }

    /// `Name (Affiliation)`, or just `Name` without an affiliation
    pub fn display_name(&self) -> String {
        match &self.affiliation {
            Some(affiliation) => format!("{} ({})", self.name, affiliation),
            None => self.name.clone(),
        }
    }
}

/// One enriched paper.
///
/// Upstream entries are inconsistently populated, so everything except the
/// identifier is optional and the identifier itself is only absent when the
/// entry's self-URI does not carry one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub identifier: Option<ArxivId>,
    pub title: Option<String>,
    pub r#abstract: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub authors: Vec<Author>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub doi: Option<String>,
    pub pdf_url: Option<String>,
    pub abs_url: Option<String>,
    pub comment: Option<String>,
    pub journal_ref: Option<String>,
}

impl MetadataRecord {
    /// Authors as `Name (Affiliation)` joined with `; `
    pub fn authors_joined(&self) -> String {
        self.authors
            .iter()
            .map(Author::display_name)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Categories joined with `, `
    pub fn categories_joined(&self) -> String {
        self.categories.join(", ")
    }

    /// Short label used in log lines
    pub fn label(&self) -> &str {
        self.identifier
            .as_ref()
            .map(ArxivId::as_str)
            .or(self.title.as_deref())
            .unwrap_or("<unidentified entry>")
    }
}
