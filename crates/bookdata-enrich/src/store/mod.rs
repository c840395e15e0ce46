//! Durable catalog storage
//!
//! Trait boundary so the pipeline never knows which backend it writes to:
//! production wires in the Postgres store, tests use the in-memory one.
//! Records are only ever created and updated by this pipeline — never
//! deleted.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use bookdata_common::isbn::Isbn;
use bookdata_common::types::BookRecord;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown record: {0}")]
    UnknownRecord(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The pipeline's view of durable storage, keyed by identifier.
///
/// `get` matches any identifier form (storage key, ISBN-10 or ISBN-13), so
/// a run keyed by one form finds a record created under the other.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a record by any of its identifier forms.
    async fn get(&self, identifier: &str) -> StoreResult<Option<BookRecord>>;

    /// Write a merged record; creates the row when none exists.
    /// Identifier columns are fill-only and never overwritten.
    async fn upsert(&self, record: &BookRecord) -> StoreResult<()>;

    /// Stamp an enrichment attempt, creating a bare record when needed.
    /// Called on failed attempts too, so retries are visible.
    async fn mark_attempted(&self, isbn: &Isbn, when: DateTime<Utc>) -> StoreResult<()>;

    /// Commit a fully successful run: the only write that sets
    /// `last_enriched`.
    async fn mark_enriched(&self, identifier: &str, when: DateTime<Utc>) -> StoreResult<()>;

    /// Record a saved cover asset and the source URL it came from.
    async fn set_cover(&self, identifier: &str, path: &str, source_url: &str) -> StoreResult<()>;

    /// Identifiers of records not yet fully enriched, in stable order.
    async fn list_pending(&self, limit: i64) -> StoreResult<Vec<String>>;
}
