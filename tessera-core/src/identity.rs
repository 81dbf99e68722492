//! Identity types: collection names, document ids, timestamps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp type using UTC timezone, matching the canonical extended
/// ISO-8601 encoding used by the tag codec (`YYYY-MM-DDTHH:MM:SS.sssZ`).
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Minimum allowed length of a sanitized collection (container) name.
pub const COLLECTION_NAME_MIN_LEN: usize = 3;
/// Maximum allowed length of a sanitized collection (container) name.
pub const COLLECTION_NAME_MAX_LEN: usize = 63;
/// Character used to pad a too-short collection name on the right.
const COLLECTION_NAME_PAD: char = 'a';

/// A collection name, sanitized for use as a blob-store container identifier.
///
/// Sanitization: lowercased; any character outside `[a-z0-9-]`
/// stripped; runs of `-` collapsed; leading/trailing `-` removed; length
/// clamped to `[3, 63]` (padded right with `'a'` if shorter, truncated if
/// longer).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Sanitize an arbitrary collection name into a valid container identifier.
    pub fn sanitize(raw: &str) -> Self {
        let lowered = raw.to_lowercase();

        let filtered: String = lowered
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();

        let collapsed = collapse_dashes(&filtered);
        let trimmed = collapsed.trim_matches('-');

        let mut name = trimmed.to_string();
        if name.len() > COLLECTION_NAME_MAX_LEN {
            name.truncate(COLLECTION_NAME_MAX_LEN);
            // Truncation may have re-exposed a trailing dash run; trim again.
            name = name.trim_end_matches('-').to_string();
        }
        while name.len() < COLLECTION_NAME_MIN_LEN {
            name.push(COLLECTION_NAME_PAD);
        }

        Self(name)
    }

    /// The sanitized name as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn collapse_dashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !last_was_dash {
                out.push(c);
            }
            last_was_dash = true;
        } else {
            out.push(c);
            last_was_dash = false;
        }
    }
    out
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(raw: &str) -> Self {
        Self::sanitize(raw)
    }
}

impl From<String> for CollectionName {
    fn from(raw: String) -> Self {
        Self::sanitize(&raw)
    }
}

/// A document identifier. Always equal to the blob name within its
/// container.
///
/// May be caller-supplied (any non-empty string accepted by the blob store's
/// naming rules) or minted fresh via [`DocumentId::new`], which produces a
/// UUIDv7-based, lexicographically-sortable identifier. Real deployments are
/// expected to plug in their own monotonic ID service; `new` exists so this
/// crate and its tests are usable standalone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Mint a new, monotonically-sortable document id.
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap a caller-supplied id verbatim.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_raw(s))
    }
}

/// Trait for a pluggable monotonic id provider, so that an embedder's own
/// 128-bit sortable id generator can be substituted for
/// [`DocumentId::new`]'s UUIDv7 default.
pub trait IdProvider: Send + Sync {
    fn next_id(&self) -> DocumentId;
}

/// Default id provider, used when the caller does not supply their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7IdProvider;

impl IdProvider for UuidV7IdProvider {
    fn next_id(&self) -> DocumentId {
        DocumentId::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_lowercases_and_strips() {
        let name = CollectionName::sanitize("My_Collection! 2024");
        assert_eq!(name.as_str(), "mycollection2024");
    }

    #[test]
    fn sanitize_strips_disallowed_characters_without_inserting_dashes() {
        let name = CollectionName::sanitize("My-Users! 2024");
        assert_eq!(name.as_str(), "my-users2024");
    }

    #[test]
    fn sanitize_collapses_dash_runs() {
        let name = CollectionName::sanitize("a---b");
        assert_eq!(name.as_str(), "a-b");
    }

    #[test]
    fn sanitize_trims_leading_trailing_dashes() {
        let name = CollectionName::sanitize("-users-");
        assert_eq!(name.as_str(), "users");
    }

    #[test]
    fn sanitize_pads_short_names() {
        let name = CollectionName::sanitize("ab");
        assert_eq!(name.as_str(), "aba");
    }

    #[test]
    fn sanitize_clamps_long_names() {
        let raw = "x".repeat(200);
        let name = CollectionName::sanitize(&raw);
        assert!(name.as_str().len() <= COLLECTION_NAME_MAX_LEN);
    }

    #[test]
    fn sanitize_empty_pads_to_min() {
        let name = CollectionName::sanitize("___");
        assert!(name.as_str().len() >= COLLECTION_NAME_MIN_LEN);
    }

    #[test]
    fn document_id_roundtrips_through_display() {
        let id = DocumentId::new();
        let text = id.to_string();
        let reparsed: DocumentId = text.parse().unwrap();
        assert_eq!(id, reparsed);
    }

    #[test]
    fn uuid_v7_provider_mints_distinct_ids() {
        let provider = UuidV7IdProvider;
        let a = provider.next_id();
        let b = provider.next_id();
        assert_ne!(a, b);
    }
}
