//! Advisory diagnostics.
//!
//! Data-quality problems never abort a run. They are collected here and
//! logged as warnings when recorded.

use serde::Serialize;
use std::fmt;

/// What kind of data-quality problem was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Item removed because its type is excluded
    FilteredItem,
    /// Item lacks one or more required fields
    MissingField,
    /// Invisible code point found in text
    InvisibleCharacter,
    /// Type-specific citation trailer could not be fully rendered
    MissingTrailer,
    /// Entry could not be decoded, or decoded only partially
    MalformedEntry,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::FilteredItem => "filtered-item",
            DiagnosticKind::MissingField => "missing-field",
            DiagnosticKind::InvisibleCharacter => "invisible-character",
            DiagnosticKind::MissingTrailer => "missing-trailer",
            DiagnosticKind::MalformedEntry => "malformed-entry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Position of the record in fetch order, when known
    pub position: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "[{}] #{}: {}", self.kind, position, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Accumulated diagnostics for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it
    pub fn push(&mut self, kind: DiagnosticKind, position: Option<usize>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            position,
            message: message.into(),
        };
        tracing::warn!(kind = %diagnostic.kind, position = ?diagnostic.position, "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.of_kind(kind).count()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
