//! Social statistics source: the Open Library search API
//!
//! A search-style request keyed by ISBN. The top document is authoritative;
//! it carries the aggregate reader counters and the work key the
//! description lookup needs. No matching document is `NotFound`, which
//! callers treat as "no social data yet", not as a failure.

use serde::Deserialize;
use tracing::debug;

use bookdata_common::{isbn::Isbn, types::SocialStats, CatalogError};

use super::{build_client, classify_status, FetchError, FetchResult};

const SEARCH_FIELDS: &str =
    "key,ratings_average,want_to_read_count,currently_reading_count,already_read_count";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<RawDoc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawDoc {
    pub key: Option<String>,
    pub ratings_average: Option<f64>,
    pub want_to_read_count: Option<i64>,
    pub currently_reading_count: Option<i64>,
    pub already_read_count: Option<i64>,
}

/// The top search hit: reader statistics plus the work reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialHit {
    pub stats: SocialStats,
    pub work_key: Option<String>,
}

/// Client for the search endpoint (`/search.json`).
pub struct SocialSource {
    client: reqwest::Client,
    base_url: String,
}

impl SocialSource {
    pub fn new(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch(&self, isbn: &Isbn) -> FetchResult<SocialHit> {
        let url = format!("{}/search.json", self.base_url);

        debug!(identifier = %isbn, "fetching social stats");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", isbn.as_str()),
                ("fields", SEARCH_FIELDS),
                ("limit", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("malformed body: {}", e)))?;

        let doc = parsed.docs.into_iter().next().ok_or(FetchError::NotFound)?;
        Ok(crate::normalize::normalize_social(doc))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_missing_docs_field() {
        let parsed: SearchResponse = serde_json::from_str(r#"{"numFound": 0}"#).unwrap();
        assert!(parsed.docs.is_empty());
    }

    #[test]
    fn test_raw_doc_partial_counters() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"docs": [{"key": "/works/OL66554W", "want_to_read_count": 120}]}"#,
        )
        .unwrap();
        let doc = &parsed.docs[0];
        assert_eq!(doc.key.as_deref(), Some("/works/OL66554W"));
        assert_eq!(doc.want_to_read_count, Some(120));
        assert_eq!(doc.ratings_average, None);
    }
}
