//! ISBN identifier validation
//!
//! Identifiers arrive from CSV uploads and stored records as free-form
//! strings. Everything is shape-checked here, before any network call is
//! made on its behalf. An [`Isbn`] is immutable once constructed.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};

/// A validated ISBN-10 or ISBN-13 edition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Isbn {
    Ten(String),
    Thirteen(String),
}

impl Isbn {
    /// Parse a raw identifier string.
    ///
    /// Hyphens and spaces are stripped. Ten characters where the first nine
    /// are digits and the last is a digit or `X` form an ISBN-10; thirteen
    /// digits form an ISBN-13. Anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.len() {
            10 => {
                let (head, tail) = normalized.split_at(9);
                let head_ok = head.chars().all(|c| c.is_ascii_digit());
                let tail_ok = tail.chars().all(|c| c.is_ascii_digit() || c == 'X');
                if head_ok && tail_ok {
                    Ok(Isbn::Ten(normalized))
                } else {
                    Err(CatalogError::InvalidIdentifier(raw.to_string()))
                }
            },
            13 if normalized.chars().all(|c| c.is_ascii_digit()) => {
                Ok(Isbn::Thirteen(normalized))
            },
            _ => Err(CatalogError::InvalidIdentifier(raw.to_string())),
        }
    }

    /// The normalized identifier string.
    pub fn as_str(&self) -> &str {
        match self {
            Isbn::Ten(s) | Isbn::Thirteen(s) => s,
        }
    }

    /// The ISBN-10 form, if this is one.
    pub fn isbn10(&self) -> Option<&str> {
        match self {
            Isbn::Ten(s) => Some(s),
            Isbn::Thirteen(_) => None,
        }
    }

    /// The ISBN-13 form, if this is one.
    pub fn isbn13(&self) -> Option<&str> {
        match self {
            Isbn::Thirteen(s) => Some(s),
            Isbn::Ten(_) => None,
        }
    }
}

impl std::fmt::Display for Isbn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Isbn {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        Isbn::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_isbn13() {
        let isbn = Isbn::parse("9780141439808").unwrap();
        assert_eq!(isbn, Isbn::Thirteen("9780141439808".to_string()));
        assert_eq!(isbn.isbn13(), Some("9780141439808"));
        assert_eq!(isbn.isbn10(), None);
    }

    #[test]
    fn test_parse_isbn10_with_check_x() {
        let isbn = Isbn::parse("080442957X").unwrap();
        assert_eq!(isbn.isbn10(), Some("080442957X"));
    }

    #[test]
    fn test_parse_strips_hyphens() {
        let isbn = Isbn::parse("978-0-14-143980-8").unwrap();
        assert_eq!(isbn.as_str(), "9780141439808");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(Isbn::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(Isbn::parse("12345").is_err());
        assert!(Isbn::parse("97801414398080").is_err());
    }

    #[test]
    fn test_parse_rejects_letters() {
        assert!(Isbn::parse("97801414398AB").is_err());
        // X is only valid in the final ISBN-10 position
        assert!(Isbn::parse("0X0442957X").is_err());
    }
}
