//! Cover asset fetching and partitioned storage
//!
//! Covers are best-effort: a missing or oversized asset leaves the record
//! without a cover, it never fails the enrichment attempt. Assets land
//! under a deterministic partition derived from the identifier so no leaf
//! directory accumulates unbounded files.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

use bookdata_common::{checksum, CatalogError};

use crate::config::CoverConfig;
use crate::sources::build_client;

/// Outcome of one cover fetch that did not produce an asset.
#[derive(Debug, Error)]
pub enum CoverError {
    #[error("cover exceeds size cap ({size} > {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("not found")]
    NotFound,

    #[error("transient error: {0}")]
    Transient(String),
}

/// A cover asset persisted under the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedCover {
    /// Path relative to the media root, `/`-separated
    pub relative_path: String,
    pub bytes: u64,
}

/// Partition path for an identifier: one directory level per leading
/// character (three levels), then `<identifier>.<ext>`.
///
/// The base identifier is isbn10 preferred, else isbn13, else the literal
/// `"unknown"`. Numeric identifiers therefore fan out over at most 1000
/// leaf directories.
pub fn partition_path(isbn10: Option<&str>, isbn13: Option<&str>, ext: &str) -> PathBuf {
    let base = [isbn10, isbn13]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or("unknown");

    let mut path = PathBuf::new();
    for c in base.chars().take(3) {
        path.push(c.to_string());
    }
    path.push(format!("{}.{}", base, ext));
    path
}

/// Downloads cover candidates and persists them under the media root.
pub struct CoverFetcher {
    client: reqwest::Client,
    media_root: PathBuf,
    max_bytes: u64,
}

impl CoverFetcher {
    pub fn new(config: &CoverConfig, user_agent: &str) -> Result<Self, CatalogError> {
        Ok(Self {
            client: build_client(user_agent, config.timeout_secs)?,
            media_root: config.media_root.clone(),
            max_bytes: config.max_bytes,
        })
    }

    /// Download a candidate URL and store it at the identifier's partition
    /// path. Re-fetching an unchanged asset leaves the file untouched.
    pub async fn fetch(
        &self,
        isbn10: Option<&str>,
        isbn13: Option<&str>,
        url: &str,
    ) -> Result<SavedCover, CoverError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoverError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CoverError::NotFound);
        }
        if !status.is_success() {
            return Err(CoverError::Transient(format!("unexpected status {}", status)));
        }

        // Reject early when the upstream declares an oversized body
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(CoverError::TooLarge {
                    size: declared,
                    max: self.max_bytes,
                });
            }
        }

        let ext = extension_for(response.headers().get(reqwest::header::CONTENT_TYPE));

        let mut data: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CoverError::Transient(e.to_string()))?;
            if (data.len() + chunk.len()) as u64 > self.max_bytes {
                // Abandon mid-stream; the declared length lied or was absent
                return Err(CoverError::TooLarge {
                    size: (data.len() + chunk.len()) as u64,
                    max: self.max_bytes,
                });
            }
            data.extend_from_slice(&chunk);
        }

        let relative = partition_path(isbn10, isbn13, ext);
        let target = self.media_root.join(&relative);
        self.write_asset(&target, &data)
            .map_err(|e| CoverError::Transient(e.to_string()))?;

        Ok(SavedCover {
            relative_path: relative_string(&relative),
            bytes: data.len() as u64,
        })
    }

    fn write_asset(&self, target: &Path, data: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Skip the write when the identical asset is already on disk
        if checksum::file_matches(target, data) {
            debug!(path = %target.display(), "cover unchanged, keeping existing file");
            return Ok(());
        }
        std::fs::write(target, data)
    }
}

fn extension_for(content_type: Option<&reqwest::header::HeaderValue>) -> &'static str {
    match content_type.and_then(|v| v.to_str().ok()) {
        Some(value) if value.contains("png") => "png",
        Some(value) if value.contains("gif") => "gif",
        _ => "jpg",
    }
}

fn relative_string(path: &Path) -> String {
    path.iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_path_isbn10() {
        let path = partition_path(Some("0123456789"), None, "jpg");
        assert_eq!(path, PathBuf::from("0/1/2/0123456789.jpg"));
    }

    #[test]
    fn test_partition_path_prefers_isbn10() {
        let path = partition_path(Some("0141439808"), Some("9780141439808"), "jpg");
        assert_eq!(path, PathBuf::from("0/1/4/0141439808.jpg"));
    }

    #[test]
    fn test_partition_path_falls_back_to_isbn13() {
        let path = partition_path(None, Some("9780141439808"), "png");
        assert_eq!(path, PathBuf::from("9/7/8/9780141439808.png"));
    }

    #[test]
    fn test_partition_path_unknown_base() {
        assert_eq!(
            partition_path(None, None, "jpg"),
            PathBuf::from("u/n/k/unknown.jpg")
        );
        assert_eq!(
            partition_path(Some(""), None, "jpg"),
            PathBuf::from("u/n/k/unknown.jpg")
        );
    }

    #[test]
    fn test_extension_for_content_types() {
        use reqwest::header::HeaderValue;
        let png = HeaderValue::from_static("image/png");
        let jpeg = HeaderValue::from_static("image/jpeg");
        assert_eq!(extension_for(Some(&png)), "png");
        assert_eq!(extension_for(Some(&jpeg)), "jpg");
        assert_eq!(extension_for(None), "jpg");
    }

    #[test]
    fn test_relative_string_is_slash_separated() {
        let path = partition_path(Some("0123456789"), None, "jpg");
        assert_eq!(relative_string(&path), "0/1/2/0123456789.jpg");
    }
}
