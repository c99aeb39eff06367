//! Validation utilities for endpoint URLs and fetched bibliography items.
//!
//! Item checks are advisory: they report into [`Diagnostics`] and never alter
//! the data they inspect.

use thiserror::Error;

use crate::models::{DiagnosticKind, Diagnostics, FetchedItem, ItemType, RequiredField};

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL contains potentially dangerous characters")]
    DangerousUrl,
}

/// Validate a configured endpoint URL
///
/// Only `http` and `https` URLs without embedded control characters are accepted.
pub fn validate_url(url: &str) -> Result<url::Url, ValidationError> {
    let url = url.trim();

    if url.is_empty() {
        return Err(ValidationError::InvalidUrl("empty URL".to_string()));
    }

    if url.chars().any(|c| c.is_control()) {
        return Err(ValidationError::DangerousUrl);
    }

    let parsed = url::Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "invalid scheme: {}",
                other
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl("missing host".to_string()));
    }

    Ok(parsed)
}

/// Code points that render as nothing but break copy/paste and search
pub const INVISIBLE_CHARACTERS: &[(char, char)] = &[
    ('\u{00AD}', '\u{00AD}'),
    ('\u{180E}', '\u{180E}'),
    ('\u{200B}', '\u{200F}'),
    ('\u{2028}', '\u{2029}'),
    ('\u{202A}', '\u{202E}'),
    ('\u{2060}', '\u{2064}'),
    ('\u{FEFF}', '\u{FEFF}'),
];

/// Characters of context shown on each side of an invisible character
const CONTEXT_CHARS: usize = 10;

pub fn is_invisible(c: char) -> bool {
    INVISIBLE_CHARACTERS
        .iter()
        .any(|&(low, high)| (low..=high).contains(&c))
}

/// An invisible character found in a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvisibleCharacter {
    pub code_point: char,
    /// Offset in characters, not bytes
    pub offset: usize,
    /// Surrounding text with the character itself removed
    pub context: String,
}

impl InvisibleCharacter {
    /// `U+XXXX` notation
    pub fn code_point_label(&self) -> String {
        format!("U+{:04X}", self.code_point as u32)
    }
}

/// Find every invisible character in `text`
pub fn find_invisible_characters(text: &str) -> Vec<InvisibleCharacter> {
    let chars: Vec<char> = text.chars().collect();

    chars
        .iter()
        .enumerate()
        .filter(|(_, c)| is_invisible(**c))
        .map(|(offset, &code_point)| {
            let start = offset.saturating_sub(CONTEXT_CHARS);
            let end = (offset + CONTEXT_CHARS + 1).min(chars.len());
            let context = chars[start..end]
                .iter()
                .filter(|c| !is_invisible(**c))
                .collect();

            InvisibleCharacter {
                code_point,
                offset,
                context,
            }
        })
        .collect()
}

/// Drop items whose type is excluded, reporting each one with its raw JSON
pub fn filter_excluded(
    items: Vec<FetchedItem>,
    excluded: &[ItemType],
    diagnostics: &mut Diagnostics,
) -> Vec<FetchedItem> {
    items
        .into_iter()
        .filter(|fetched| {
            if !excluded.contains(&fetched.item.item_type) {
                return true;
            }
            diagnostics.push(
                DiagnosticKind::FilteredItem,
                Some(fetched.position),
                format!(
                    "Skipping {} item: {}",
                    fetched.item.item_type, fetched.raw
                ),
            );
            false
        })
        .collect()
}

/// Report one diagnostic per item listing all required fields it lacks
pub fn check_required_fields(
    items: &[FetchedItem],
    required: &[RequiredField],
    diagnostics: &mut Diagnostics,
) {
    for fetched in items {
        let missing: Vec<&str> = required
            .iter()
            .filter(|field| !fetched.item.has_field(**field))
            .map(|field| field.as_str())
            .collect();

        if !missing.is_empty() {
            diagnostics.push(
                DiagnosticKind::MissingField,
                Some(fetched.position),
                format!(
                    "{} is missing {}",
                    fetched.item.label(),
                    missing.join(", ")
                ),
            );
        }
    }
}

/// Report every invisible character found in item titles
pub fn scan_titles(items: &[FetchedItem], diagnostics: &mut Diagnostics) {
    for fetched in items {
        let Some(title) = fetched.item.title.as_deref() else {
            continue;
        };

        for found in find_invisible_characters(title) {
            diagnostics.push(
                DiagnosticKind::InvisibleCharacter,
                Some(fetched.position),
                format!(
                    "{} at offset {} in title: \"{}\"",
                    found.code_point_label(),
                    found.offset,
                    found.context
                ),
            );
        }
    }
}
