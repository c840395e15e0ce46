//! Primary bibliographic source: the Open Library books API
//!
//! One GET keyed by ISBN (the wire format accepts several bibkeys per
//! request, which the CSV import path uses). The upstream occasionally
//! answers a 200 with an HTML error page or an empty body; that is a
//! malformed-body transient, not a not-found.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use bookdata_common::{isbn::Isbn, types::PartialRecord, CatalogError};

use super::{build_client, classify_status, FetchError, FetchResult, RawText};
use crate::normalize;

/// Raw edition payload, exactly as the upstream shapes it.
#[derive(Debug, Default, Deserialize)]
pub struct RawEdition {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<RawNamed>,
    #[serde(default)]
    pub publishers: Vec<RawNamed>,
    pub publish_date: Option<String>,
    pub number_of_pages: Option<i32>,
    #[serde(default)]
    pub languages: Vec<RawLanguage>,
    #[serde(default)]
    pub identifiers: RawIdentifiers,
    pub cover: Option<RawCover>,
    #[serde(default)]
    pub subjects: Vec<RawNamed>,
    pub description: Option<RawText>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawNamed {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawLanguage {
    pub key: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawIdentifiers {
    #[serde(default)]
    pub amazon: Vec<String>,
}

/// Cover URL candidates in the upstream's three sizes.
#[derive(Debug, Default, Deserialize)]
pub struct RawCover {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

/// Client for the edition endpoint (`/api/books`).
pub struct EditionSource {
    client: reqwest::Client,
    base_url: String,
}

impl EditionSource {
    pub fn new(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one edition by ISBN.
    pub async fn fetch(&self, isbn: &Isbn) -> FetchResult<PartialRecord> {
        let mut editions = self.fetch_many(std::slice::from_ref(isbn)).await?;
        editions
            .remove(isbn.as_str())
            .ok_or(FetchError::NotFound)
    }

    /// Fetch several editions in one request.
    ///
    /// Returns a map from normalized ISBN to the normalized record; ISBNs
    /// the upstream has no entry for are simply absent.
    pub async fn fetch_many(
        &self,
        isbns: &[Isbn],
    ) -> FetchResult<HashMap<String, PartialRecord>> {
        let bibkeys = isbns
            .iter()
            .map(|isbn| format!("ISBN:{}", isbn))
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/api/books", self.base_url);

        debug!(bibkeys = %bibkeys, "fetching editions");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("bibkeys", bibkeys.as_str()),
                ("format", "json"),
                ("jscmd", "data"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response.text().await?;

        // The upstream sometimes returns HTML or an empty body on a 200
        let raw: HashMap<String, RawEdition> = serde_json::from_str(body.trim())
            .map_err(|e| FetchError::Transient(format!("malformed body: {}", e)))?;

        Ok(raw
            .into_iter()
            .map(|(key, edition)| {
                let isbn = key.trim_start_matches("ISBN:").to_string();
                (isbn, normalize::normalize_edition(edition))
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_edition_deserializes_upstream_shape() {
        let body = r#"{
            "title": "Pride and Prejudice",
            "authors": [{"url": "/authors/OL21594A", "name": "Jane Austen"}],
            "publishers": [{"name": "Penguin Classics"}],
            "publish_date": "April 29, 2003",
            "number_of_pages": 480,
            "languages": [{"key": "/languages/eng"}],
            "identifiers": {"amazon": ["0141439513"], "openlibrary": ["OL7409621M"]},
            "cover": {
                "small": "https://covers.example.org/b/id/8409593-S.jpg",
                "medium": "https://covers.example.org/b/id/8409593-M.jpg",
                "large": "https://covers.example.org/b/id/8409593-L.jpg"
            },
            "subjects": [{"name": "Fiction", "url": "/subjects/fiction"}]
        }"#;

        let raw: RawEdition = serde_json::from_str(body).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Pride and Prejudice"));
        assert_eq!(raw.authors[0].name.as_deref(), Some("Jane Austen"));
        assert_eq!(raw.number_of_pages, Some(480));
        assert_eq!(raw.identifiers.amazon, vec!["0141439513"]);
        assert!(raw.cover.unwrap().large.is_some());
    }

    #[test]
    fn test_raw_edition_tolerates_missing_fields() {
        let raw: RawEdition = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();
        assert_eq!(raw.title.as_deref(), Some("Bare"));
        assert!(raw.authors.is_empty());
        assert!(raw.cover.is_none());
        assert!(raw.description.is_none());
    }

    #[test]
    fn test_description_accepts_object_form() {
        let raw: RawEdition = serde_json::from_str(
            r#"{"description": {"type": "/type/text", "value": "A novel."}}"#,
        )
        .unwrap();
        assert_eq!(raw.description.unwrap().into_string(), "A novel.");
    }
}
