//! Recipient address validation and one-way hashing.
//!
//! Raw addresses are transient call parameters only. Anything persisted is
//! keyed by a SHA-256 hash of the normalized (trimmed, lowercased) address.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("address regex is valid")
});

/// A validated recipient: the persisted hash key plus the email domain
/// used for domain-level aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientKey {
    /// Hex-encoded SHA-256 of the normalized address.
    pub address_hash: String,
    /// Domain part of the normalized address.
    pub domain: String,
}

impl RecipientKey {
    /// Validate and hash a raw address. Fails fast on malformed input,
    /// before any storage is touched.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyRecipient);
        }
        if !ADDRESS_RE.is_match(&normalized) {
            return Err(ValidationError::MalformedRecipient(raw.trim().to_string()));
        }
        let domain = normalized
            .split_once('@')
            .map(|(_, d)| d.to_string())
            .ok_or_else(|| ValidationError::MalformedRecipient(raw.trim().to_string()))?;

        let digest = Sha256::digest(normalized.as_bytes());
        Ok(Self {
            address_hash: hex::encode(digest),
            domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_and_case_insensitive() {
        let a = RecipientKey::parse("Alice@Example.COM").unwrap();
        let b = RecipientKey::parse("  alice@example.com ").unwrap();
        assert_eq!(a.address_hash, b.address_hash);
        assert_eq!(a.domain, "example.com");
    }

    #[test]
    fn hash_does_not_contain_the_address() {
        let key = RecipientKey::parse("alice@example.com").unwrap();
        assert_eq!(key.address_hash.len(), 64);
        assert!(!key.address_hash.contains("alice"));
    }

    #[test]
    fn empty_address_rejected() {
        assert!(matches!(
            RecipientKey::parse("   "),
            Err(ValidationError::EmptyRecipient)
        ));
    }

    #[test]
    fn malformed_addresses_rejected() {
        for bad in ["no-at-sign", "a@b", "two@@example.com", "spaces in@example.com"] {
            assert!(
                matches!(
                    RecipientKey::parse(bad),
                    Err(ValidationError::MalformedRecipient(_))
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn distinct_addresses_hash_differently() {
        let a = RecipientKey::parse("alice@example.com").unwrap();
        let b = RecipientKey::parse("bob@example.com").unwrap();
        assert_ne!(a.address_hash, b.address_hash);
    }
}
