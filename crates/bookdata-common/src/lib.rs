//! Bookdata Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the bookdata workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all bookdata
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Identifiers**: ISBN-10/ISBN-13 validation
//! - **Checksums**: Asset integrity utilities
//! - **Types**: Shared domain types and data structures
//!
//! # Example
//!
//! ```no_run
//! use bookdata_common::{Result, isbn::Isbn};
//!
//! fn load(raw: &str) -> Result<()> {
//!     let isbn = Isbn::parse(raw)?;
//!     println!("identifier: {}", isbn);
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod isbn;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CatalogError, Result};
