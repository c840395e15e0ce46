//! Checksum utilities for asset verification

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 hex digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA-256 hex digest of any readable source.
pub fn sha256_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA-256 hex digest of a file on disk.
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256_reader(&mut file)
}

/// Whether `path` already holds exactly `data`.
///
/// A missing file is simply "no". Used to keep repeated asset downloads
/// byte-identical without rewriting unchanged files.
pub fn file_matches(path: impl AsRef<Path>, data: &[u8]) -> bool {
    match sha256_file(path) {
        Ok(existing) => existing == sha256_hex(data),
        Err(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_reader_matches_slice() {
        let mut cursor = Cursor::new(b"hello world");
        assert_eq!(sha256_reader(&mut cursor).unwrap(), sha256_hex(b"hello world"));
    }

    #[test]
    fn test_file_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();

        assert!(file_matches(&path, b"jpeg bytes"));
        assert!(!file_matches(&path, b"other bytes"));
        assert!(!file_matches(dir.path().join("missing.jpg"), b"jpeg bytes"));
    }
}
