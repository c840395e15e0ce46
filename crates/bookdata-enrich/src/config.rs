//! Enrichment pipeline configuration
//!
//! Every knob the pipeline exposes lives in one explicit structure that is
//! passed into the batch runner at construction; there is no module-level
//! mutable state. Defaults match the pacing the upstreams tolerate.

use std::path::PathBuf;
use std::time::Duration;

use crate::pacing::DelayRange;

// ============================================================================
// Enrichment Configuration Constants
// ============================================================================

/// Default base URL of the primary bibliographic source.
pub const DEFAULT_OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";

/// Default request timeout for the JSON sources, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Default request timeout for cover downloads, in seconds.
pub const DEFAULT_COVER_TIMEOUT_SECS: u64 = 20;

/// Default maximum cover asset size, in bytes (5 MiB).
pub const DEFAULT_COVER_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Default directory covers are stored under.
pub const DEFAULT_MEDIA_ROOT: &str = "./media/covers";

/// Default minimum delay between calls to cooperative hosts, in ms.
pub const DEFAULT_API_DELAY_MIN_MS: u64 = 700;

/// Default maximum delay between calls to cooperative hosts, in ms.
pub const DEFAULT_API_DELAY_MAX_MS: u64 = 3_000;

/// Default minimum delay before hitting the fallback host, in seconds.
/// The fallback host blocks bursty traffic; delays are minutes, not ms.
pub const DEFAULT_FALLBACK_DELAY_MIN_SECS: u64 = 300;

/// Default maximum delay before hitting the fallback host, in seconds.
pub const DEFAULT_FALLBACK_DELAY_MAX_SECS: u64 = 900;

/// Default request timeout for the fallback host, in seconds.
pub const DEFAULT_FALLBACK_TIMEOUT_SECS: u64 = 20;

/// Default bound on result blocks parsed from one fallback listing page.
pub const DEFAULT_FALLBACK_MAX_ITEMS: usize = 30;

/// Default number of pending records one batch run picks up.
pub const DEFAULT_BATCH_SIZE: i64 = 50;

/// User agent sent with every outbound request.
pub const DEFAULT_USER_AGENT: &str =
    "bookdata-enrich/0.3 (+https://github.com/bookdata-works/bookdata)";

/// Enrichment pipeline configuration
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Base URL of the primary bibliographic source (edition, search and
    /// work endpoints all live under it)
    pub openlibrary_base_url: String,
    /// Timeout applied to the JSON source clients
    pub fetch_timeout_secs: u64,
    /// Fallback listing source; `None` disables fallback chaining
    pub fallback: Option<FallbackConfig>,
    /// Cover asset fetching and storage
    pub covers: CoverConfig,
    /// Delay range between calls to cooperative hosts, in ms
    pub api_delay_min_ms: u64,
    pub api_delay_max_ms: u64,
    /// Number of pending records a `pending` run picks up
    pub batch_size: i64,
    pub user_agent: String,
}

/// Fallback (HTML listing) source configuration
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Listing page URL with a `{query}` placeholder
    pub url_template: String,
    /// Bound on result blocks parsed per page
    pub max_items: usize,
    pub timeout_secs: u64,
    /// Delay range before each request, in seconds
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
}

/// Cover asset configuration
#[derive(Debug, Clone)]
pub struct CoverConfig {
    /// Root directory the partitioned cover tree is written under
    pub media_root: PathBuf,
    /// Hard cap on a single cover download
    pub max_bytes: u64,
    pub timeout_secs: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            max_bytes: DEFAULT_COVER_MAX_BYTES,
            timeout_secs: DEFAULT_COVER_TIMEOUT_SECS,
        }
    }
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            openlibrary_base_url: DEFAULT_OPENLIBRARY_BASE_URL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fallback: None,
            covers: CoverConfig::default(),
            api_delay_min_ms: DEFAULT_API_DELAY_MIN_MS,
            api_delay_max_ms: DEFAULT_API_DELAY_MAX_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EnrichConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `BOOKDATA_OPENLIBRARY_URL`: primary source base URL
    /// - `BOOKDATA_FETCH_TIMEOUT`: JSON source timeout, seconds
    /// - `BOOKDATA_FALLBACK_URL`: fallback listing URL template with a
    ///   `{query}` placeholder; setting it enables fallback chaining
    /// - `BOOKDATA_FALLBACK_MAX_ITEMS`, `BOOKDATA_FALLBACK_TIMEOUT`
    /// - `BOOKDATA_FALLBACK_DELAY_MIN` / `_MAX`: seconds
    /// - `BOOKDATA_MEDIA_ROOT`: cover storage root
    /// - `BOOKDATA_COVER_MAX_BYTES`: cover size cap
    /// - `BOOKDATA_API_DELAY_MIN_MS` / `_MAX_MS`: cooperative pacing range
    /// - `BOOKDATA_BATCH_SIZE`: pending-run batch size
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self {
            openlibrary_base_url: std::env::var("BOOKDATA_OPENLIBRARY_URL")
                .unwrap_or_else(|_| DEFAULT_OPENLIBRARY_BASE_URL.to_string()),
            fetch_timeout_secs: env_parse("BOOKDATA_FETCH_TIMEOUT", DEFAULT_FETCH_TIMEOUT_SECS),
            fallback: None,
            covers: CoverConfig {
                media_root: std::env::var("BOOKDATA_MEDIA_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_MEDIA_ROOT)),
                max_bytes: env_parse("BOOKDATA_COVER_MAX_BYTES", DEFAULT_COVER_MAX_BYTES),
                timeout_secs: env_parse("BOOKDATA_COVER_TIMEOUT", DEFAULT_COVER_TIMEOUT_SECS),
            },
            api_delay_min_ms: env_parse("BOOKDATA_API_DELAY_MIN_MS", DEFAULT_API_DELAY_MIN_MS),
            api_delay_max_ms: env_parse("BOOKDATA_API_DELAY_MAX_MS", DEFAULT_API_DELAY_MAX_MS),
            batch_size: env_parse("BOOKDATA_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        };

        if let Ok(template) = std::env::var("BOOKDATA_FALLBACK_URL") {
            config.fallback = Some(FallbackConfig {
                url_template: template,
                max_items: env_parse("BOOKDATA_FALLBACK_MAX_ITEMS", DEFAULT_FALLBACK_MAX_ITEMS),
                timeout_secs: env_parse("BOOKDATA_FALLBACK_TIMEOUT", DEFAULT_FALLBACK_TIMEOUT_SECS),
                delay_min_secs: env_parse(
                    "BOOKDATA_FALLBACK_DELAY_MIN",
                    DEFAULT_FALLBACK_DELAY_MIN_SECS,
                ),
                delay_max_secs: env_parse(
                    "BOOKDATA_FALLBACK_DELAY_MAX",
                    DEFAULT_FALLBACK_DELAY_MAX_SECS,
                ),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.openlibrary_base_url.starts_with("http") {
            anyhow::bail!(
                "openlibrary base URL must be http(s): {}",
                self.openlibrary_base_url
            );
        }
        if self.api_delay_min_ms > self.api_delay_max_ms {
            anyhow::bail!("api delay range is inverted");
        }
        if self.batch_size <= 0 {
            anyhow::bail!("batch size must be positive");
        }
        if self.covers.max_bytes == 0 {
            anyhow::bail!("cover size cap must be positive");
        }
        if let Some(ref fallback) = self.fallback {
            if !fallback.url_template.contains("{query}") {
                anyhow::bail!("fallback URL template is missing the {{query}} placeholder");
            }
            if fallback.delay_min_secs > fallback.delay_max_secs {
                anyhow::bail!("fallback delay range is inverted");
            }
            if fallback.max_items == 0 {
                anyhow::bail!("fallback max items must be positive");
            }
        }
        Ok(())
    }

    /// Pacing range for cooperative hosts.
    pub fn api_delay(&self) -> DelayRange {
        DelayRange::new(
            Duration::from_millis(self.api_delay_min_ms),
            Duration::from_millis(self.api_delay_max_ms),
        )
    }
}

impl FallbackConfig {
    /// Pacing range for the fallback host.
    pub fn delay(&self) -> DelayRange {
        DelayRange::new(
            Duration::from_secs(self.delay_min_secs),
            Duration::from_secs(self.delay_max_secs),
        )
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EnrichConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let config = EnrichConfig {
            api_delay_min_ms: 5_000,
            api_delay_max_ms: 700,
            ..EnrichConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_query_placeholder() {
        let config = EnrichConfig {
            fallback: Some(FallbackConfig {
                url_template: "https://market.example.com/bestsellers".to_string(),
                max_items: DEFAULT_FALLBACK_MAX_ITEMS,
                timeout_secs: DEFAULT_FALLBACK_TIMEOUT_SECS,
                delay_min_secs: 1,
                delay_max_secs: 2,
            }),
            ..EnrichConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
