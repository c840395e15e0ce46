//! Per-item enrichment orchestration
//!
//! Drives one identifier through primary fetch, fallback chaining, the
//! best-effort social/description/cover steps, the merge, and the final
//! enriched commit. Failures stay contained to the item — except a block
//! signal, which aborts the whole run.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};

use bookdata_common::{isbn::Isbn, CatalogError};

use crate::config::EnrichConfig;
use crate::covers::CoverFetcher;
use crate::merge;
use crate::normalize;
use crate::pacing::RateLimiter;
use crate::sources::marketplace::ListingSource;
use crate::sources::openlibrary::EditionSource;
use crate::sources::search::SocialSource;
use crate::sources::works::DescriptionSource;
use crate::sources::FetchError;
use crate::store::CatalogStore;

/// Pipeline step an outcome is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Primary,
    Fallback,
    Social,
    Description,
    Merge,
    Cover,
    Commit,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Primary => "primary",
            Step::Fallback => "fallback",
            Step::Social => "social",
            Step::Description => "description",
            Step::Merge => "merge",
            Step::Cover => "cover",
            Step::Commit => "commit",
        };
        write!(f, "{}", name)
    }
}

/// Why an item failed without aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Neither the primary source nor the fallback had an entry
    NoPrimaryData,
    /// A required step hit a retryable error; a later run picks it up
    Transient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub step: Step,
    pub message: String,
}

/// Outcome of one item, terminal for this run.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Enriched,
    Failed(ItemFailure),
}

impl ItemOutcome {
    fn failed(kind: FailureKind, step: Step, message: impl Into<String>) -> Self {
        ItemOutcome::Failed(ItemFailure {
            kind,
            step,
            message: message.into(),
        })
    }
}

/// An upstream is actively rejecting our traffic; the batch must stop.
#[derive(Debug, Error)]
#[error("blocked during {step}: {message}")]
pub struct RunAbort {
    pub step: Step,
    pub message: String,
}

impl RunAbort {
    fn new(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            message: message.into(),
        }
    }
}

struct Fallback {
    source: ListingSource,
    limiter: RateLimiter,
}

/// Drives one identifier through the enrichment state machine.
pub struct Orchestrator {
    editions: EditionSource,
    social: SocialSource,
    descriptions: DescriptionSource,
    fallback: Option<Fallback>,
    covers: CoverFetcher,
    store: Arc<dyn CatalogStore>,
    api_limiter: RateLimiter,
    cover_limiter: RateLimiter,
}

impl Orchestrator {
    pub fn new(config: &EnrichConfig, store: Arc<dyn CatalogStore>) -> Result<Self, CatalogError> {
        let base = &config.openlibrary_base_url;
        let agent = &config.user_agent;
        let timeout = config.fetch_timeout_secs;

        let fallback = config
            .fallback
            .as_ref()
            .map(|fb| -> Result<Fallback, CatalogError> {
                Ok(Fallback {
                    source: ListingSource::new(
                        &fb.url_template,
                        agent,
                        fb.timeout_secs,
                        fb.max_items,
                    )?,
                    limiter: RateLimiter::new(fb.delay()),
                })
            })
            .transpose()?;

        Ok(Self {
            editions: EditionSource::new(base, agent, timeout)?,
            social: SocialSource::new(base, agent, timeout)?,
            descriptions: DescriptionSource::new(base, agent, timeout)?,
            fallback,
            covers: CoverFetcher::new(&config.covers, agent)?,
            store,
            api_limiter: RateLimiter::new(config.api_delay()),
            // The cover host is separate from the API host; it gets its own
            // clock but the same cooperative range
            cover_limiter: RateLimiter::new(config.api_delay()),
        })
    }

    /// Run one identifier through the whole state machine.
    ///
    /// `Err` means a block signal: the caller must stop the batch.
    pub async fn enrich_one(&self, isbn: &Isbn) -> Result<ItemOutcome, RunAbort> {
        // ---- primary fetch (required) ----
        self.api_limiter.pace().await;
        let mut partial = match self.editions.fetch(isbn).await {
            Ok(partial) => partial,
            Err(FetchError::NotFound) => match self.fetch_fallback(isbn).await? {
                FallbackOutcome::Hit(partial) => partial,
                FallbackOutcome::Miss => {
                    self.stamp_attempt(isbn).await;
                    return Ok(ItemOutcome::failed(
                        FailureKind::NoPrimaryData,
                        Step::Primary,
                        "no source has an entry for this identifier",
                    ));
                },
                FallbackOutcome::Transient(message) => {
                    self.stamp_attempt(isbn).await;
                    return Ok(ItemOutcome::failed(
                        FailureKind::Transient,
                        Step::Fallback,
                        message,
                    ));
                },
            },
            Err(FetchError::Transient(message)) => {
                self.stamp_attempt(isbn).await;
                return Ok(ItemOutcome::failed(
                    FailureKind::Transient,
                    Step::Primary,
                    message,
                ));
            },
            Err(FetchError::Blocked(message)) => {
                return Err(RunAbort::new(Step::Primary, message));
            },
        };

        // ---- social lookup (best effort) ----
        self.api_limiter.pace().await;
        match self.social.fetch(isbn).await {
            Ok(hit) => {
                partial.work_key = hit.work_key;
                partial.social = Some(hit.stats);
            },
            Err(FetchError::Blocked(message)) => {
                return Err(RunAbort::new(Step::Social, message));
            },
            Err(outcome) => {
                debug!(identifier = %isbn, outcome = %outcome, "no social stats this run");
            },
        }

        // ---- description (best effort, needs a work reference) ----
        if partial.description.is_none() {
            if let Some(work_key) = partial.work_key.clone() {
                self.api_limiter.pace().await;
                match self.descriptions.fetch(&work_key).await {
                    Ok(text) if !text.is_empty() => partial.description = Some(text),
                    Ok(_) => {},
                    Err(FetchError::Blocked(message)) => {
                        return Err(RunAbort::new(Step::Description, message));
                    },
                    Err(outcome) => {
                        debug!(work_key = %work_key, outcome = %outcome, "no description this run");
                    },
                }
            }
        }

        // ---- merge + persist (partial data survives later failures) ----
        let existing = match self.store.get(isbn.as_str()).await {
            Ok(existing) => existing,
            Err(error) => {
                self.stamp_attempt(isbn).await;
                return Ok(ItemOutcome::failed(
                    FailureKind::Transient,
                    Step::Merge,
                    error.to_string(),
                ));
            },
        };
        let merged = merge::merge(existing.as_ref(), isbn, &partial, Utc::now());
        if let Err(error) = self.store.upsert(&merged).await {
            return Ok(ItemOutcome::failed(
                FailureKind::Transient,
                Step::Merge,
                error.to_string(),
            ));
        }
        let key = merged.primary_identifier().to_string();

        // ---- cover (best effort) ----
        if let Some(url) = partial.cover_url.as_deref() {
            self.cover_limiter.pace().await;
            match self
                .covers
                .fetch(merged.isbn10.as_deref(), merged.isbn13.as_deref(), url)
                .await
            {
                Ok(saved) => {
                    if let Err(error) =
                        self.store.set_cover(&key, &saved.relative_path, url).await
                    {
                        return Ok(ItemOutcome::failed(
                            FailureKind::Transient,
                            Step::Cover,
                            error.to_string(),
                        ));
                    }
                    debug!(identifier = %key, path = %saved.relative_path, bytes = saved.bytes, "cover saved");
                },
                Err(outcome) => {
                    info!(identifier = %key, outcome = %outcome, "cover skipped");
                },
            }
        } else {
            debug!(identifier = %key, "no cover candidate, skipping asset fetch");
        }

        // ---- commit: the only transition that sets last_enriched ----
        if let Err(error) = self.store.mark_enriched(&key, Utc::now()).await {
            return Ok(ItemOutcome::failed(
                FailureKind::Transient,
                Step::Commit,
                error.to_string(),
            ));
        }

        info!(identifier = %key, source = %partial.source, "record enriched");
        Ok(ItemOutcome::Enriched)
    }

    async fn fetch_fallback(&self, isbn: &Isbn) -> Result<FallbackOutcome, RunAbort> {
        let Some(fallback) = &self.fallback else {
            return Ok(FallbackOutcome::Miss);
        };

        fallback.limiter.pace().await;
        match fallback.source.fetch(isbn.as_str()).await {
            Ok(hits) => Ok(hits
                .first()
                .map(|hit| FallbackOutcome::Hit(normalize::normalize_listing(hit)))
                .unwrap_or(FallbackOutcome::Miss)),
            Err(FetchError::NotFound) => Ok(FallbackOutcome::Miss),
            Err(FetchError::Transient(message)) => Ok(FallbackOutcome::Transient(message)),
            Err(FetchError::Blocked(message)) => Err(RunAbort::new(Step::Fallback, message)),
        }
    }

    /// Best-effort attempt stamp; bookkeeping must not mask the real error.
    async fn stamp_attempt(&self, isbn: &Isbn) {
        if let Err(error) = self.store.mark_attempted(isbn, Utc::now()).await {
            error!(identifier = %isbn, error = %error, "failed to record attempt");
        }
    }
}

enum FallbackOutcome {
    Hit(bookdata_common::types::PartialRecord),
    Miss,
    Transient(String),
}
