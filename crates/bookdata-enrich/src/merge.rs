//! Coalesce merge of an observed field set into the stored record
//!
//! Pure computation; the store then writes the merged row as-is. The rules
//! (spelled out once, here, and nowhere else):
//!
//! - a populated stored field is never replaced by an empty or missing
//!   incoming value; incoming non-empty values win
//! - the social group (rating + counters) is measured together and is
//!   refreshed wholesale when this run observed it, never field-by-field
//! - identifiers are immutable once set; a missing form may be filled in
//! - `attempted_at` is stamped on every merge; `last_enriched` is never
//!   touched here — only the orchestrator's final commit sets it

use chrono::{DateTime, Utc};

use bookdata_common::isbn::Isbn;
use bookdata_common::types::{BookRecord, PartialRecord};

/// Merge one run's observations into the stored record (or a bare one).
pub fn merge(
    existing: Option<&BookRecord>,
    isbn: &Isbn,
    incoming: &PartialRecord,
    now: DateTime<Utc>,
) -> BookRecord {
    let mut record = existing
        .cloned()
        .unwrap_or_else(|| BookRecord::bare(isbn));

    // Fill a missing identifier form; never replace a populated one
    if record.isbn10.is_none() {
        record.isbn10 = isbn.isbn10().map(String::from);
    }
    if record.isbn13.is_none() {
        record.isbn13 = isbn.isbn13().map(String::from);
    }

    record.title = coalesce(&incoming.title, record.title);
    record.authors = coalesce(&incoming.authors, record.authors);
    record.publisher = coalesce(&incoming.publisher, record.publisher);
    record.publish_year = incoming.publish_year.or(record.publish_year);
    record.publish_date = coalesce(&incoming.publish_date, record.publish_date);
    record.pages = incoming.pages.or(record.pages);
    record.language = coalesce(&incoming.language, record.language);
    record.description = coalesce(&incoming.description, record.description);
    record.amazon_asin = coalesce(&incoming.amazon_asin, record.amazon_asin);
    record.work_key = coalesce(&incoming.work_key, record.work_key);

    if !incoming.subjects.is_empty() {
        record.subjects = incoming.subjects.clone();
    }

    // Counters and rating were measured together this run or not at all
    if let Some(social) = incoming.social {
        record.social = social;
    }

    record.source = Some(incoming.source);
    record.attempted_at = Some(now);

    record
}

/// Incoming wins when it carries a non-empty value, else existing stands.
fn coalesce(incoming: &Option<String>, existing: Option<String>) -> Option<String> {
    match incoming.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Some(value.to_string()),
        None => existing,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bookdata_common::types::{SocialStats, SourceId};

    fn isbn() -> Isbn {
        Isbn::parse("9780141439808").unwrap()
    }

    fn incoming_with_title(title: Option<&str>) -> PartialRecord {
        let mut partial = PartialRecord::new(SourceId::OpenLibrary);
        partial.title = title.map(String::from);
        partial
    }

    #[test]
    fn test_merge_creates_record_from_bare_identifier() {
        let merged = merge(None, &isbn(), &incoming_with_title(Some("Example Book")), Utc::now());
        assert_eq!(merged.isbn13.as_deref(), Some("9780141439808"));
        assert_eq!(merged.title.as_deref(), Some("Example Book"));
        assert!(merged.attempted_at.is_some());
        assert!(merged.last_enriched.is_none());
    }

    #[test]
    fn test_merge_never_clobbers_populated_with_empty() {
        let existing = merge(None, &isbn(), &incoming_with_title(Some("Kept Title")), Utc::now());

        let merged = merge(Some(&existing), &isbn(), &incoming_with_title(None), Utc::now());
        assert_eq!(merged.title.as_deref(), Some("Kept Title"));

        let merged = merge(Some(&existing), &isbn(), &incoming_with_title(Some("  ")), Utc::now());
        assert_eq!(merged.title.as_deref(), Some("Kept Title"));
    }

    #[test]
    fn test_merge_incoming_value_wins() {
        let existing = merge(None, &isbn(), &incoming_with_title(Some("Old Title")), Utc::now());
        let merged = merge(Some(&existing), &isbn(), &incoming_with_title(Some("New Title")), Utc::now());
        assert_eq!(merged.title.as_deref(), Some("New Title"));
    }

    #[test]
    fn test_merge_social_group_is_wholesale() {
        let mut first = PartialRecord::new(SourceId::OpenLibrary);
        first.social = Some(SocialStats {
            rating: Some(4.2),
            want_to_read: 100,
            currently_reading: 5,
            already_read: 60,
        });
        let existing = merge(None, &isbn(), &first, Utc::now());
        assert_eq!(existing.social.rating, Some(4.2));

        // A run that observed the group replaces it entirely, even with
        // lower counters and no rating
        let mut second = PartialRecord::new(SourceId::OpenLibrary);
        second.social = Some(SocialStats {
            rating: None,
            want_to_read: 90,
            currently_reading: 7,
            already_read: 61,
        });
        let merged = merge(Some(&existing), &isbn(), &second, Utc::now());
        assert_eq!(merged.social.rating, None);
        assert_eq!(merged.social.want_to_read, 90);

        // A run that observed nothing leaves the group alone
        let third = PartialRecord::new(SourceId::OpenLibrary);
        let merged = merge(Some(&merged), &isbn(), &third, Utc::now());
        assert_eq!(merged.social.want_to_read, 90);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut partial = incoming_with_title(Some("Example Book"));
        partial.publisher = Some("Penguin".to_string());
        partial.publish_year = Some(2003);

        let now = Utc::now();
        let once = merge(None, &isbn(), &partial, now);
        let twice = merge(Some(&once), &isbn(), &partial, now);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_preserves_identifiers() {
        let ten = Isbn::parse("0141439808").unwrap();
        let existing = merge(None, &isbn(), &PartialRecord::new(SourceId::OpenLibrary), Utc::now());
        assert_eq!(existing.isbn13.as_deref(), Some("9780141439808"));

        // A later run keyed by the ISBN-10 form fills the gap but does not
        // disturb the stored ISBN-13
        let merged = merge(Some(&existing), &ten, &PartialRecord::new(SourceId::OpenLibrary), Utc::now());
        assert_eq!(merged.isbn13.as_deref(), Some("9780141439808"));
        assert_eq!(merged.isbn10.as_deref(), Some("0141439808"));
    }

    #[test]
    fn test_merge_never_sets_last_enriched() {
        let mut partial = incoming_with_title(Some("Example Book"));
        partial.social = Some(SocialStats::default());
        let merged = merge(None, &isbn(), &partial, Utc::now());
        assert!(merged.last_enriched.is_none());
    }
}
