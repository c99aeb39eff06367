//! Bibliography items decoded from a Zotero library listing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zotero item type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    Preprint,
    JournalArticle,
    Attachment,
    Note,
    /// Any other Zotero type, passed through untouched
    Other(String),
}

impl ItemType {
    /// The Zotero name of this type (`journalArticle`, `preprint`, ...)
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Preprint => "preprint",
            ItemType::JournalArticle => "journalArticle",
            ItemType::Attachment => "attachment",
            ItemType::Note => "note",
            ItemType::Other(s) => s,
        }
    }
}

impl From<&str> for ItemType {
    fn from(s: &str) -> Self {
        match s {
            "preprint" => ItemType::Preprint,
            "journalArticle" => ItemType::JournalArticle,
            "attachment" => ItemType::Attachment,
            "note" => ItemType::Note,
            other => ItemType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A creator of an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creator {
    /// Two-field name
    Person {
        first_name: Option<String>,
        last_name: String,
    },
    /// Single-field name (institutions, collaborations)
    Single(String),
}

impl Creator {
    pub fn person(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let first_name = first_name.into();
        Creator::Person {
            first_name: (!first_name.trim().is_empty()).then_some(first_name),
            last_name: last_name.into(),
        }
    }

    /// `J. Doe` for people, the verbatim name otherwise
    pub fn short_name(&self) -> String {
        match self {
            Creator::Person {
                first_name,
                last_name,
            } => match first_name.as_deref().and_then(|f| f.trim().chars().next()) {
                Some(initial) => format!("{}. {}", initial, last_name),
                None => last_name.clone(),
            },
            Creator::Single(name) => name.clone(),
        }
    }
}

/// Fields that can be declared as required for every bibliography item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "creators")]
    Creators,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "DOI")]
    Doi,
    #[serde(rename = "repository")]
    Repository,
    #[serde(rename = "archiveID")]
    ArchiveId,
    #[serde(rename = "journalAbbreviation")]
    JournalAbbreviation,
    #[serde(rename = "volume")]
    Volume,
    #[serde(rename = "pages")]
    Pages,
    #[serde(rename = "tags")]
    Tags,
}

impl RequiredField {
    pub const ALL: [RequiredField; 10] = [
        RequiredField::Title,
        RequiredField::Creators,
        RequiredField::Date,
        RequiredField::Doi,
        RequiredField::Repository,
        RequiredField::ArchiveId,
        RequiredField::JournalAbbreviation,
        RequiredField::Volume,
        RequiredField::Pages,
        RequiredField::Tags,
    ];

    /// The Zotero field name
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredField::Title => "title",
            RequiredField::Creators => "creators",
            RequiredField::Date => "date",
            RequiredField::Doi => "DOI",
            RequiredField::Repository => "repository",
            RequiredField::ArchiveId => "archiveID",
            RequiredField::JournalAbbreviation => "journalAbbreviation",
            RequiredField::Volume => "volume",
            RequiredField::Pages => "pages",
            RequiredField::Tags => "tags",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequiredField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequiredField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = RequiredField::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown field '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// A normalized bibliography item.
///
/// Empty strings from the listing are decoded as `None`, so every `Some`
/// field holds renderable text.
#[derive(Debug, Clone, PartialEq)]
pub struct BibliographyItem {
    pub key: Option<String>,
    pub item_type: ItemType,
    pub title: Option<String>,
    pub date: Option<String>,
    pub creators: Vec<Creator>,
    pub doi: Option<String>,
    pub repository: Option<String>,
    pub archive_id: Option<String>,
    pub journal_abbreviation: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub tags: Vec<String>,
}

impl BibliographyItem {
    pub fn new(item_type: ItemType) -> Self {
        Self {
            key: None,
            item_type,
            title: None,
            date: None,
            creators: Vec::new(),
            doi: None,
            repository: None,
            archive_id: None,
            journal_abbreviation: None,
            volume: None,
            pages: None,
            tags: Vec::new(),
        }
    }

    /// The segment of the date before the first `-`
    pub fn year(&self) -> Option<&str> {
        self.date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .map(str::trim)
            .filter(|y| !y.is_empty())
    }

    /// Exact, case-sensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_field(&self, field: RequiredField) -> bool {
        match field {
            RequiredField::Title => self.title.is_some(),
            RequiredField::Creators => !self.creators.is_empty(),
            RequiredField::Date => self.date.is_some(),
            RequiredField::Doi => self.doi.is_some(),
            RequiredField::Repository => self.repository.is_some(),
            RequiredField::ArchiveId => self.archive_id.is_some(),
            RequiredField::JournalAbbreviation => self.journal_abbreviation.is_some(),
            RequiredField::Volume => self.volume.is_some(),
            RequiredField::Pages => self.pages.is_some(),
            RequiredField::Tags => !self.tags.is_empty(),
        }
    }

    /// Title, else the item key; used to reference the item in diagnostics
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or("<untitled item>")
    }
}

/// An item together with where it came from in the listing
#[derive(Debug, Clone)]
pub struct FetchedItem {
    /// Zero-based position in fetch order
    pub position: usize,
    /// The item as served, kept for diagnostics
    pub raw: serde_json::Value,
    pub item: BibliographyItem,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(Creator::person("Jane", "Doe").short_name(), "J. Doe");
        assert_eq!(Creator::person("Émile", "Borel").short_name(), "É. Borel");
        assert_eq!(Creator::person("", "Doe").short_name(), "Doe");
        assert_eq!(
            Creator::Single("ATLAS Collaboration".into()).short_name(),
            "ATLAS Collaboration"
        );
    }

    #[test]
    fn test_year() {
        let mut item = BibliographyItem::new(ItemType::Preprint);
        assert_eq!(item.year(), None);
        item.date = Some("2023-05-01".into());
        assert_eq!(item.year(), Some("2023"));
        item.date = Some("2021".into());
        assert_eq!(item.year(), Some("2021"));
    }

    #[test]
    fn test_has_tag_is_exact() {
        let mut item = BibliographyItem::new(ItemType::JournalArticle);
        item.tags = vec!["QUSP FOR5413".into()];
        assert!(item.has_tag("QUSP FOR5413"));
        assert!(!item.has_tag("QUSP"));
        assert!(!item.has_tag("qusp for5413"));
    }

    #[test]
    fn test_item_type_round_trip() {
        assert_eq!(ItemType::from("journalArticle"), ItemType::JournalArticle);
        assert_eq!(
            ItemType::from("bookSection"),
            ItemType::Other("bookSection".into())
        );
        assert_eq!(ItemType::Other("thesis".into()).as_str(), "thesis");
    }

    #[test]
    fn test_required_field_from_str() {
        assert_eq!("DOI".parse::<RequiredField>(), Ok(RequiredField::Doi));
        assert_eq!(
            "archiveID".parse::<RequiredField>(),
            Ok(RequiredField::ArchiveId)
        );
        assert!("doi".parse::<RequiredField>().is_err());
    }
}
