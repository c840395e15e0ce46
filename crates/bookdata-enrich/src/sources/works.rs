//! Long-form description source, keyed by a work reference
//!
//! Only invoked when the social lookup yielded a work key. The
//! `description` field arrives as a plain string or a `{"value": ...}`
//! object; both flatten to a plain string before leaving the adapter.

use serde::Deserialize;
use tracing::debug;

use bookdata_common::CatalogError;

use super::{build_client, classify_status, FetchError, FetchResult, RawText};

#[derive(Debug, Deserialize)]
struct RawWork {
    description: Option<RawText>,
}

/// Client for the work endpoint (`/works/<key>.json`).
pub struct DescriptionSource {
    client: reqwest::Client,
    base_url: String,
}

impl DescriptionSource {
    pub fn new(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(user_agent, timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the description for a work reference like `/works/OL66554W`.
    ///
    /// Returns a plain string, possibly empty when the work has no
    /// description yet.
    pub async fn fetch(&self, work_key: &str) -> FetchResult<String> {
        let key = if work_key.starts_with('/') {
            work_key.to_string()
        } else {
            format!("/works/{}", work_key)
        };
        let url = format!("{}{}.json", self.base_url, key);

        debug!(work_key = %key, "fetching description");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let parsed: RawWork = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("malformed body: {}", e)))?;

        Ok(parsed
            .description
            .map(RawText::into_string)
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_work_plain_description() {
        let parsed: RawWork =
            serde_json::from_str(r#"{"title": "X", "description": "Plain text."}"#).unwrap();
        assert_eq!(parsed.description.unwrap().into_string(), "Plain text.");
    }

    #[test]
    fn test_raw_work_object_description() {
        let parsed: RawWork = serde_json::from_str(
            r#"{"description": {"type": "/type/text", "value": "Typed text."}}"#,
        )
        .unwrap();
        assert_eq!(parsed.description.unwrap().into_string(), "Typed text.");
    }

    #[test]
    fn test_raw_work_missing_description() {
        let parsed: RawWork = serde_json::from_str(r#"{"title": "X"}"#).unwrap();
        assert!(parsed.description.is_none());
    }
}
