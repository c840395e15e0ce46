//! Bookdata Enrich Library
//!
//! The catalog enrichment pipeline: takes a queue of ISBNs, fetches
//! metadata from external bibliographic sources with fallback chaining,
//! normalizes the responses into a canonical record, merges that record
//! into durable storage without clobbering known-good data, fetches a
//! cover asset, and marks the record enriched only when the whole unit of
//! work succeeds.
//!
//! # Pipeline
//!
//! ```text
//! BatchRunner -> Orchestrator -> sources -> normalize -> merge -> store
//!                                                 covers (best effort)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bookdata_enrich::{batch::BatchRunner, config::EnrichConfig, store::memory::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EnrichConfig::from_env()?;
//!     let store = Arc::new(MemoryStore::new());
//!     let runner = BatchRunner::new(&config, store)?;
//!     let summary = runner.run(&["9780141439808".to_string()]).await;
//!     println!("enriched {}", summary.enriched);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod covers;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod pacing;
pub mod sources;
pub mod store;
