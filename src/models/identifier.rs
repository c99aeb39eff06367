//! arXiv identifier grammar.
//!
//! Two shapes are recognised:
//!
//! - new style: `2101.01234` (four digits, a dot, four or five digits)
//! - legacy style: `hep-th/9901001` (lowercase archive, a slash, seven digits)
//!
//! Version suffixes (`v2`) are never part of the identifier.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

static LINK_PATTERN: OnceLock<Regex> = OnceLock::new();
static BARE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn link_pattern() -> &'static Regex {
    LINK_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}|[a-z\-]+/\d{7})")
            .expect("arXiv link pattern must compile")
    })
}

fn bare_pattern() -> &'static Regex {
    BARE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d{4}\.\d{4,5}|[a-z\-]+/\d{7})(?:v\d+)?$")
            .expect("arXiv identifier pattern must compile")
    })
}

/// A normalized arXiv identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArxivId(String);

impl ArxivId {
    /// Parse a bare identifier such as `2101.01234v2` or `hep-th/9901001`
    pub fn parse(id: &str) -> Option<Self> {
        bare_pattern()
            .captures(id.trim())
            .and_then(|c| c.get(1))
            .map(|m| Self(m.as_str().to_lowercase()))
    }

    /// Find the identifier inside an `arxiv.org/abs/...` or `arxiv.org/pdf/...` URL
    pub fn find_in(text: &str) -> Option<Self> {
        link_pattern()
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| Self(m.as_str().to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArxivId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_ids() {
        assert_eq!(ArxivId::parse("2101.01234").unwrap().as_str(), "2101.01234");
        assert_eq!(ArxivId::parse("2101.01234v3").unwrap().as_str(), "2101.01234");
        assert_eq!(ArxivId::parse("0704.0001").unwrap().as_str(), "0704.0001");
        assert_eq!(
            ArxivId::parse("HEP-TH/9901001").unwrap().as_str(),
            "hep-th/9901001"
        );
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(ArxivId::parse("").is_none());
        assert!(ArxivId::parse("21.01234").is_none());
        assert!(ArxivId::parse("2101.123").is_none());
        assert!(ArxivId::parse("math.GT/0104020").is_none());
        assert!(ArxivId::parse("hep-th/990100").is_none());
    }

    #[test]
    fn test_find_in_urls() {
        let id = ArxivId::find_in("http://arxiv.org/abs/2301.12345v1").unwrap();
        assert_eq!(id.as_str(), "2301.12345");

        let id = ArxivId::find_in("https://arxiv.org/pdf/cond-mat/0102536v1").unwrap();
        assert_eq!(id.as_str(), "cond-mat/0102536");

        assert!(ArxivId::find_in("https://arxiv.org/help/2301.12345").is_none());
        assert!(ArxivId::find_in("https://example.org/abs/2301.12345").is_none());
    }

    #[test]
    fn test_ordering_is_lexical() {
        let mut ids = vec![
            ArxivId::parse("2301.00002").unwrap(),
            ArxivId::parse("hep-th/9901001").unwrap(),
            ArxivId::parse("1999.00001").unwrap(),
        ];
        ids.sort();
        let ids: Vec<&str> = ids.iter().map(ArxivId::as_str).collect();
        assert_eq!(ids, vec!["1999.00001", "2301.00002", "hep-th/9901001"]);
    }
}
