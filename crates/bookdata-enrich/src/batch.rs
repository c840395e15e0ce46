//! Batch enrichment runs
//!
//! Reads an ordered identifier list (a CSV with a recognized identifier
//! column, or the store's pending set), paces the orchestrator over it, and
//! accumulates per-item outcomes. One bad item never stops the batch; a
//! block signal stops it immediately.

use std::path::Path;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use bookdata_common::{isbn::Isbn, CatalogError};

use crate::config::EnrichConfig;
use crate::orchestrator::{ItemFailure, ItemOutcome, Orchestrator};
use crate::store::CatalogStore;

/// Identifier columns recognized in input files, in lookup order.
const IDENTIFIER_COLUMNS: [&str; 3] = ["isbn13", "isbn10", "isbn"];

/// One item's failure, with enough context to replay it.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemError {
    pub identifier: String,
    pub step: String,
    pub message: String,
}

/// Outcome totals for one batch run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Items that reached a terminal outcome before any stop
    pub processed: usize,
    pub enriched: usize,
    pub failed: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub errors: Vec<ItemError>,
    /// Why the run stopped early, when it did
    pub stopped: Option<String>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "processed={} enriched={} failed={} skipped={} invalid={}",
            self.processed, self.enriched, self.failed, self.skipped, self.invalid
        )?;
        if let Some(ref reason) = self.stopped {
            write!(f, " stopped=\"{}\"", reason)?;
        }
        Ok(())
    }
}

/// Read identifiers from a CSV file.
///
/// Uses `column` when given, else the first recognized identifier column.
/// Values are trimmed; empty cells are dropped (shape validation happens
/// per item at run time).
pub fn read_isbn_csv(path: &Path, column: Option<&str>) -> Result<Vec<String>, CatalogError> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| CatalogError::Parse(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| CatalogError::Parse(e.to_string()))?
        .clone();

    let column_index = match column {
        Some(name) => headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::Parse(format!("column {:?} not found", name)))?,
        None => IDENTIFIER_COLUMNS
            .iter()
            .find_map(|candidate| {
                headers
                    .iter()
                    .position(|header| header.eq_ignore_ascii_case(candidate))
            })
            .ok_or_else(|| {
                CatalogError::Parse("no identifier column (isbn13/isbn10/isbn) found".to_string())
            })?,
    };

    let mut identifiers = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| CatalogError::Parse(e.to_string()))?;
        if let Some(value) = record.get(column_index) {
            let value = value.trim();
            if !value.is_empty() {
                identifiers.push(value.to_string());
            }
        }
    }

    Ok(identifiers)
}

/// Runs the orchestrator over an ordered identifier list.
pub struct BatchRunner {
    orchestrator: Orchestrator,
    store: Arc<dyn CatalogStore>,
}

impl BatchRunner {
    pub fn new(config: &EnrichConfig, store: Arc<dyn CatalogStore>) -> Result<Self, CatalogError> {
        Ok(Self {
            orchestrator: Orchestrator::new(config, Arc::clone(&store))?,
            store,
        })
    }

    /// Enrich the store's not-yet-enriched records, oldest key first.
    pub async fn run_pending(&self, limit: i64) -> Result<RunSummary, CatalogError> {
        let pending = self
            .store
            .list_pending(limit)
            .await
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if pending.is_empty() {
            info!("no records to enrich");
        }
        Ok(self.run(&pending).await)
    }

    /// Run every identifier in order, isolating per-item failures.
    pub async fn run(&self, identifiers: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = identifiers.len();

        info!(total, "starting enrichment batch");

        let progress = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{pos}/{len}] {msg}")
        {
            progress.set_style(style.progress_chars("#>-"));
        }

        for raw in identifiers {
            progress.set_message(raw.clone());

            // Shape validation happens before any network call
            let isbn = match Isbn::parse(raw) {
                Ok(isbn) => isbn,
                Err(error) => {
                    warn!(identifier = %raw, "rejecting malformed identifier");
                    summary.invalid += 1;
                    summary.processed += 1;
                    summary.errors.push(ItemError {
                        identifier: raw.clone(),
                        step: "validate".to_string(),
                        message: error.to_string(),
                    });
                    progress.inc(1);
                    continue;
                },
            };

            // Already fully enriched records are skipped, not re-fetched
            match self.store.get(isbn.as_str()).await {
                Ok(Some(record)) if record.is_enriched() => {
                    debug!(identifier = %isbn, "already enriched, skipping");
                    summary.skipped += 1;
                    summary.processed += 1;
                    progress.inc(1);
                    continue;
                },
                Ok(_) => {},
                Err(db_error) => {
                    summary.failed += 1;
                    summary.processed += 1;
                    summary.errors.push(ItemError {
                        identifier: isbn.to_string(),
                        step: "lookup".to_string(),
                        message: db_error.to_string(),
                    });
                    progress.inc(1);
                    continue;
                },
            }

            match self.orchestrator.enrich_one(&isbn).await {
                Ok(ItemOutcome::Enriched) => summary.enriched += 1,
                Ok(ItemOutcome::Failed(failure)) => {
                    warn!(
                        identifier = %isbn,
                        step = %failure.step,
                        message = %failure.message,
                        "item failed, continuing batch"
                    );
                    summary.failed += 1;
                    summary.errors.push(item_error(&isbn, failure));
                },
                Err(abort) => {
                    error!(
                        step = %abort.step,
                        message = %abort.message,
                        processed = summary.processed,
                        "block signal received, stopping run"
                    );
                    summary.stopped = Some(abort.to_string());
                    break;
                },
            }

            summary.processed += 1;
            progress.inc(1);
        }

        progress.finish_and_clear();
        info!(%summary, "batch finished");
        summary
    }
}

fn item_error(isbn: &Isbn, failure: ItemFailure) -> ItemError {
    ItemError {
        identifier: isbn.to_string(),
        step: failure.step.to_string(),
        message: failure.message,
    }
}
