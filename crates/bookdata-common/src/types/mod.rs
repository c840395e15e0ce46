//! Common types used across the bookdata workspace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::isbn::Isbn;

/// Which upstream produced the current data for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    /// Structured bibliographic JSON API keyed by ISBN
    OpenLibrary,
    /// HTML marketplace listings, used only as a fallback
    Marketplace,
}

impl SourceId {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::OpenLibrary => "openlibrary",
            SourceId::Marketplace => "marketplace",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "openlibrary" => Some(SourceId::OpenLibrary),
            "marketplace" => Some(SourceId::Marketplace),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate reader statistics, measured together by the social source.
///
/// A missing rating is semantically different from zero: `None` means the
/// upstream has no rating yet. Counters default to 0 when the source knows
/// the work but has no activity for a counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialStats {
    pub rating: Option<f64>,
    pub want_to_read: i64,
    pub currently_reading: i64,
    pub already_read: i64,
}

/// The field set one enrichment run observed for an identifier.
///
/// Produced by the normalizer from a single source's raw payload (plus the
/// best-effort social/description lookups) and consumed by the merger.
/// `None` means "this run did not observe the field", which the coalesce
/// merge treats differently from an observed empty value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub title: Option<String>,
    /// Author display string, joined with ", " in source order
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    /// Raw free-text date as the upstream sent it, kept for audit
    pub publish_date: Option<String>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    /// Marketplace item id (e.g. an ASIN) when a source exposes one
    pub amazon_asin: Option<String>,
    /// Upstream work key usable for the description lookup
    pub work_key: Option<String>,
    /// Best cover candidate after large → medium → small selection
    pub cover_url: Option<String>,
    /// Present only when the social source returned a match this run;
    /// the whole group is then authoritative for this run
    pub social: Option<SocialStats>,
    pub source: SourceId,
}

impl PartialRecord {
    pub fn new(source: SourceId) -> Self {
        Self {
            title: None,
            authors: None,
            publisher: None,
            publish_year: None,
            publish_date: None,
            pages: None,
            language: None,
            description: None,
            subjects: Vec::new(),
            amazon_asin: None,
            work_key: None,
            cover_url: None,
            social: None,
            source,
        }
    }
}

// ============================================================================
// Canonical Record
// ============================================================================

/// The canonical, storage-resident representation of a book's metadata.
///
/// Created as a bare identifier by catalog ingestion and mutated exclusively
/// by the merge/upsert path. At least one of `isbn13`/`isbn10` is always
/// present; once set, an identifier never changes. `last_enriched` is null
/// until an enrichment run fully succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Preferred stable key when present
    pub isbn13: Option<String>,
    pub isbn10: Option<String>,

    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub publish_date: Option<String>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub amazon_asin: Option<String>,
    pub work_key: Option<String>,

    pub social: SocialStats,

    /// Relative storage path of the saved cover asset, or null
    pub cover_path: Option<String>,
    /// Source URL the cover was fetched from, kept for audit
    pub cover_source_url: Option<String>,

    /// Set on every enrichment attempt, success or failure
    pub attempted_at: Option<DateTime<Utc>>,
    /// Set only when a whole enrichment run succeeded
    pub last_enriched: Option<DateTime<Utc>>,
    /// Upstream that produced the current descriptive data
    pub source: Option<SourceId>,
}

impl BookRecord {
    /// A bare record carrying nothing but its identifier.
    pub fn bare(isbn: &Isbn) -> Self {
        Self {
            isbn13: isbn.isbn13().map(String::from),
            isbn10: isbn.isbn10().map(String::from),
            title: None,
            authors: None,
            publisher: None,
            publish_year: None,
            publish_date: None,
            pages: None,
            language: None,
            description: None,
            subjects: Vec::new(),
            amazon_asin: None,
            work_key: None,
            social: SocialStats::default(),
            cover_path: None,
            cover_source_url: None,
            attempted_at: None,
            last_enriched: None,
            source: None,
        }
    }

    /// The storage key: isbn13 preferred, else isbn10.
    ///
    /// Construction guarantees at least one is present.
    pub fn primary_identifier(&self) -> &str {
        self.isbn13
            .as_deref()
            .or(self.isbn10.as_deref())
            .unwrap_or_default()
    }

    /// Whether a previous run fully enriched this record.
    pub fn is_enriched(&self) -> bool {
        self.last_enriched.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_identifier_prefers_isbn13() {
        let mut record = BookRecord::bare(&Isbn::parse("9780141439808").unwrap());
        record.isbn10 = Some("0141439808".to_string());
        assert_eq!(record.primary_identifier(), "9780141439808");
    }

    #[test]
    fn test_primary_identifier_falls_back_to_isbn10() {
        let record = BookRecord::bare(&Isbn::parse("0141439808").unwrap());
        assert_eq!(record.primary_identifier(), "0141439808");
    }

    #[test]
    fn test_source_id_round_trip() {
        assert_eq!(SourceId::from_db("openlibrary"), Some(SourceId::OpenLibrary));
        assert_eq!(SourceId::from_db("marketplace"), Some(SourceId::Marketplace));
        assert_eq!(SourceId::from_db("loc"), None);
    }
}
