//! # bibharvest
//!
//! Harvest bibliographic records from paginated remote listings and export
//! them as a single file.
//!
//! Two pipelines are provided:
//!
//! - arXiv: crawl the full-text search results, enrich the identifiers through
//!   the Atom export API and write a CSV file
//! - Zotero: fetch a library through the web API, check the items and render
//!   an HTML bibliography with tag sections
//!
//! ## Architecture
//!
//! - [`models`]: Identifiers, metadata records, bibliography items and diagnostics
//! - [`sources`]: Page fetchers and API clients
//! - [`export`]: CSV and HTML writers
//! - [`pipeline`]: End-to-end runs tying the above together
//! - [`utils`]: HTTP client, retry and validation helpers
//! - [`config`]: Configuration management

pub mod config;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use models::{ArxivId, BibliographyItem, Diagnostics, MetadataRecord};
pub use pipeline::{run_arxiv, run_zotero, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
