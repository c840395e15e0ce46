//! In-memory catalog store
//!
//! Backs integration tests and the library example; same observable
//! behavior as the Postgres store, minus durability.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bookdata_common::isbn::Isbn;
use bookdata_common::types::BookRecord;

use super::{CatalogStore, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, BookRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bare, not-yet-enriched record (what catalog ingestion would
    /// have created).
    pub fn seed_bare(&self, isbn: &Isbn) {
        let record = BookRecord::bare(isbn);
        self.lock()
            .insert(record.primary_identifier().to_string(), record);
    }

    /// Snapshot of every stored record, for assertions.
    pub fn snapshot(&self) -> Vec<BookRecord> {
        let mut records: Vec<_> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.primary_identifier().cmp(b.primary_identifier()));
        records
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BookRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn find_key(&self, identifier: &str) -> Option<String> {
        let records = self.lock();
        if records.contains_key(identifier) {
            return Some(identifier.to_string());
        }
        records
            .iter()
            .find(|(_, record)| {
                record.isbn10.as_deref() == Some(identifier)
                    || record.isbn13.as_deref() == Some(identifier)
            })
            .map(|(key, _)| key.clone())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get(&self, identifier: &str) -> StoreResult<Option<BookRecord>> {
        Ok(self
            .find_key(identifier)
            .and_then(|key| self.lock().get(&key).cloned()))
    }

    async fn upsert(&self, record: &BookRecord) -> StoreResult<()> {
        let key = record.primary_identifier().to_string();
        let mut records = self.lock();
        match records.get_mut(&key) {
            Some(existing) => {
                // Identifier columns are fill-only
                let isbn10 = existing.isbn10.take().or_else(|| record.isbn10.clone());
                let isbn13 = existing.isbn13.take().or_else(|| record.isbn13.clone());
                let last_enriched = existing.last_enriched;
                *existing = record.clone();
                existing.isbn10 = isbn10;
                existing.isbn13 = isbn13;
                existing.last_enriched = last_enriched.or(record.last_enriched);
            },
            None => {
                records.insert(key, record.clone());
            },
        }
        Ok(())
    }

    async fn mark_attempted(&self, isbn: &Isbn, when: DateTime<Utc>) -> StoreResult<()> {
        let key = self
            .find_key(isbn.as_str())
            .unwrap_or_else(|| isbn.as_str().to_string());
        let mut records = self.lock();
        records
            .entry(key)
            .or_insert_with(|| BookRecord::bare(isbn))
            .attempted_at = Some(when);
        Ok(())
    }

    async fn mark_enriched(&self, identifier: &str, when: DateTime<Utc>) -> StoreResult<()> {
        let key = self
            .find_key(identifier)
            .ok_or_else(|| StoreError::UnknownRecord(identifier.to_string()))?;
        let mut records = self.lock();
        if let Some(record) = records.get_mut(&key) {
            record.last_enriched = Some(when);
        }
        Ok(())
    }

    async fn set_cover(&self, identifier: &str, path: &str, source_url: &str) -> StoreResult<()> {
        let key = self
            .find_key(identifier)
            .ok_or_else(|| StoreError::UnknownRecord(identifier.to_string()))?;
        let mut records = self.lock();
        if let Some(record) = records.get_mut(&key) {
            record.cover_path = Some(path.to_string());
            record.cover_source_url = Some(source_url.to_string());
        }
        Ok(())
    }

    async fn list_pending(&self, limit: i64) -> StoreResult<Vec<String>> {
        let mut pending: Vec<String> = self
            .lock()
            .values()
            .filter(|record| !record.is_enriched())
            .map(|record| record.primary_identifier().to_string())
            .collect();
        pending.sort();
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn isbn() -> Isbn {
        Isbn::parse("9780141439808").unwrap()
    }

    #[tokio::test]
    async fn test_get_matches_any_identifier_form() {
        let store = MemoryStore::new();
        let mut record = BookRecord::bare(&isbn());
        record.isbn10 = Some("0141439808".to_string());
        store.upsert(&record).await.unwrap();

        assert!(store.get("9780141439808").await.unwrap().is_some());
        assert!(store.get("0141439808").await.unwrap().is_some());
        assert!(store.get("0000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_attempted_creates_bare_record() {
        let store = MemoryStore::new();
        let when = Utc::now();
        store.mark_attempted(&isbn(), when).await.unwrap();

        let record = store.get("9780141439808").await.unwrap().unwrap();
        assert_eq!(record.attempted_at, Some(when));
        assert!(record.title.is_none());
        assert!(record.last_enriched.is_none());
    }

    #[tokio::test]
    async fn test_list_pending_excludes_enriched() {
        let store = MemoryStore::new();
        store.seed_bare(&isbn());
        store.seed_bare(&Isbn::parse("0141439808").unwrap());
        store
            .mark_enriched("0141439808", Utc::now())
            .await
            .unwrap();

        let pending = store.list_pending(10).await.unwrap();
        assert_eq!(pending, vec!["9780141439808".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_preserves_existing_last_enriched() {
        let store = MemoryStore::new();
        store.seed_bare(&isbn());
        store
            .mark_enriched("9780141439808", Utc::now())
            .await
            .unwrap();

        let mut record = BookRecord::bare(&isbn());
        record.title = Some("Refreshed".to_string());
        store.upsert(&record).await.unwrap();

        let stored = store.get("9780141439808").await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Refreshed"));
        assert!(stored.last_enriched.is_some());
    }
}
