//! Core data models: identifiers, metadata records, bibliography items and diagnostics.

mod bibliography;
mod diagnostics;
mod identifier;
mod metadata;

pub use bibliography::{BibliographyItem, Creator, FetchedItem, ItemType, RequiredField};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use identifier::ArxivId;
pub use metadata::{Author, MetadataRecord};
