//! Source client adapters
//!
//! One adapter per upstream. Every adapter returns its payload already
//! normalized into the canonical field set; the raw wire shapes never leak
//! past this boundary. Adapters never mutate shared state.

pub mod marketplace;
pub mod openlibrary;
pub mod search;
pub mod works;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use bookdata_common::CatalogError;

/// Outcome of one upstream fetch.
///
/// `NotFound` is a valid negative result, not an error condition; required
/// steps react to it with fallback chaining, best-effort steps proceed with
/// empty data. `Blocked` means the upstream is actively rejecting our
/// traffic pattern and must terminate the whole batch, not just the item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("transient error: {0}")]
    Transient(String),

    #[error("blocked by upstream: {0}")]
    Blocked(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts and connect failures are retryable on a later run
        FetchError::Transient(err.to_string())
    }
}

/// Map a non-success HTTP status to a fetch error.
///
/// 429 and 503 are the rate-limit statuses the upstreams use as block
/// signals; everything else unexpected is transient.
pub fn classify_status(status: reqwest::StatusCode) -> FetchError {
    match status.as_u16() {
        429 | 503 => FetchError::Blocked(format!("upstream returned {}", status)),
        _ => FetchError::Transient(format!("unexpected status {}", status)),
    }
}

/// Anti-bot challenge marker scan for HTML bodies.
pub fn is_captcha(html: &str) -> bool {
    html.to_lowercase().contains("captcha")
}

/// A field the upstream serves either as a plain string or as a
/// `{"value": ...}` object. Both flatten to the plain string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawText {
    Plain(String),
    Typed { value: String },
}

impl RawText {
    pub fn into_string(self) -> String {
        match self {
            RawText::Plain(s) | RawText::Typed { value: s } => s,
        }
    }
}

/// Build the HTTP client every adapter uses.
pub(crate) fn build_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client, CatalogError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CatalogError::Network(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_block_signals() {
        assert!(matches!(
            classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            FetchError::Blocked(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::SERVICE_UNAVAILABLE),
            FetchError::Blocked(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            classify_status(reqwest::StatusCode::NOT_FOUND),
            FetchError::Transient(_)
        ));
    }

    #[test]
    fn test_captcha_marker_is_case_insensitive() {
        assert!(is_captcha("<html>Please solve this CAPTCHA to continue</html>"));
        assert!(!is_captcha("<html>Best sellers</html>"));
    }

    #[test]
    fn test_raw_text_flattens_both_shapes() {
        let plain: RawText = serde_json::from_str("\"a description\"").unwrap();
        assert_eq!(plain.into_string(), "a description");

        let typed: RawText =
            serde_json::from_str(r#"{"type": "/type/text", "value": "a description"}"#).unwrap();
        assert_eq!(typed.into_string(), "a description");
    }
}
