//! Normalization: raw upstream shapes to the canonical field set
//!
//! Pure functions only; no I/O happens here. Whatever inconsistency the
//! upstreams serve (string-or-object descriptions, missing counter fields,
//! free-text dates) is resolved here and never leaks further down the
//! pipeline.

use chrono::{Datelike, Utc};

use bookdata_common::types::{PartialRecord, SocialStats, SourceId};

use crate::sources::marketplace::ListingHit;
use crate::sources::openlibrary::{RawEdition, RawLanguage, RawNamed};
use crate::sources::search::{RawDoc, SocialHit};
use crate::sources::RawText;

/// Oldest plausible publication year (movable type).
const MIN_PLAUSIBLE_YEAR: i32 = 1450;

/// Map a raw edition payload to the canonical field set.
pub fn normalize_edition(raw: RawEdition) -> PartialRecord {
    let mut record = PartialRecord::new(SourceId::OpenLibrary);

    record.title = non_empty(raw.title);
    record.authors = join_names(&raw.authors);
    record.publisher = raw
        .publishers
        .first()
        .and_then(|p| p.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from);
    record.publish_year = raw
        .publish_date
        .as_deref()
        .and_then(extract_year)
        .filter(|year| plausible_year(*year));
    record.publish_date = non_empty(raw.publish_date);
    record.pages = raw.number_of_pages;
    record.language = raw.languages.first().and_then(language_code);
    record.description = non_empty(raw.description.map(RawText::into_string));
    record.subjects = raw
        .subjects
        .iter()
        .filter_map(|subject| subject.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();
    record.amazon_asin = raw.identifiers.amazon.into_iter().next().and_then(|id| {
        let id = id.trim().to_string();
        (!id.is_empty()).then_some(id)
    });
    record.cover_url = raw
        .cover
        .and_then(|cover| pick_cover(cover.large, cover.medium, cover.small));

    record
}

/// Map the top search document to social stats plus the work reference.
///
/// Missing counters default to 0; a missing rating stays `None` — absence
/// is semantically different from zero and no default is ever invented.
pub fn normalize_social(doc: RawDoc) -> SocialHit {
    SocialHit {
        stats: SocialStats {
            rating: doc.ratings_average,
            want_to_read: doc.want_to_read_count.unwrap_or(0),
            currently_reading: doc.currently_reading_count.unwrap_or(0),
            already_read: doc.already_read_count.unwrap_or(0),
        },
        work_key: doc.key.filter(|key| !key.is_empty()),
    }
}

/// Map a fallback listing hit to the canonical field set.
///
/// The listing page only knows title, author and the vendor item id.
pub fn normalize_listing(hit: &ListingHit) -> PartialRecord {
    let mut record = PartialRecord::new(SourceId::Marketplace);
    record.title = non_empty(Some(hit.title.clone()));
    record.authors = non_empty(Some(hit.author.clone()));
    record.amazon_asin = non_empty(Some(hit.asin.clone()));
    record
}

/// Extract a publication year from a free-text date string.
///
/// The first window of four consecutive digits is the year: tolerant of
/// "March 3, 2005", "2005-03-01" and "circa 1800s" alike. Fewer than four
/// consecutive digits anywhere means no year.
pub fn extract_year(raw: &str) -> Option<i32> {
    let bytes = raw.as_bytes();
    let mut run_start = None;

    for (index, byte) in bytes.iter().enumerate() {
        if byte.is_ascii_digit() {
            let start = *run_start.get_or_insert(index);
            if index - start == 3 {
                return raw[start..=index].parse().ok();
            }
        } else {
            run_start = None;
        }
    }

    None
}

/// Whether a year falls in the plausible publication range.
pub fn plausible_year(year: i32) -> bool {
    (MIN_PLAUSIBLE_YEAR..=Utc::now().year() + 1).contains(&year)
}

/// Join author names with ", ", skipping empties, preserving source order.
fn join_names(names: &[RawNamed]) -> Option<String> {
    let joined = names
        .iter()
        .filter_map(|named| named.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    (!joined.is_empty()).then_some(joined)
}

/// Language code: the tail of the `key` path, else the plain name.
fn language_code(language: &RawLanguage) -> Option<String> {
    if let Some(key) = language.key.as_deref() {
        let tail = key.rsplit('/').next().unwrap_or(key);
        if !tail.is_empty() {
            return Some(tail.to_string());
        }
    }
    language
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}

/// Candidate selection order: large, then medium, then small.
fn pick_cover(
    large: Option<String>,
    medium: Option<String>,
    small: Option<String>,
) -> Option<String> {
    [large, medium, small]
        .into_iter()
        .flatten()
        .find(|url| !url.trim().is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
