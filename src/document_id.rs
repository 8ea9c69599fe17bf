//! Content-derived document identifiers.
//!
//! The id of a document is a digest of its serialized bytes, encoded as
//! URL-safe base64 without padding. Indexing the same event twice therefore
//! targets the same document, which keeps retries idempotent.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// Seeds for the degraded hash. Ids are stable only within one build: ahash
/// output may change across crate versions and CPU features.
const DEGRADED_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Digest used to derive document ids
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
    /// A digest that was asked for but is not available here
    Unavailable(String),
}

impl DigestAlgorithm {
    /// Resolve a digest name such as `SHA-1` or `sha256`.
    pub fn from_name(name: &str) -> Self {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA" | "SHA1" => DigestAlgorithm::Sha1,
            "SHA256" => DigestAlgorithm::Sha256,
            _ => DigestAlgorithm::Unavailable(name.trim().to_string()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha1 => write!(f, "SHA-1"),
            DigestAlgorithm::Sha256 => write!(f, "SHA-256"),
            DigestAlgorithm::Unavailable(name) => write!(f, "{} (unavailable)", name),
        }
    }
}

/// A document id and whether it came from the degraded hash.
///
/// Degraded ids are 64-bit and collide far more readily than digest ids.
/// They are not portable across builds of the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
    pub value: String,
    pub degraded: bool,
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Derives ids from serialized document bytes.
#[derive(Debug, Clone)]
pub struct DocumentIdBuilder {
    algorithm: DigestAlgorithm,
}

impl DocumentIdBuilder {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        if let DigestAlgorithm::Unavailable(name) = &algorithm {
            tracing::warn!(
                "Digest '{}' is not available, document ids fall back to a non-cryptographic hash",
                name
            );
        }
        Self { algorithm }
    }

    pub fn algorithm(&self) -> &DigestAlgorithm {
        &self.algorithm
    }

    /// Derive the id of a serialized document.
    pub fn document_id(&self, content: &[u8]) -> DocumentId {
        match &self.algorithm {
            DigestAlgorithm::Sha1 => DocumentId {
                value: URL_SAFE_NO_PAD.encode(Sha1::digest(content)),
                degraded: false,
            },
            DigestAlgorithm::Sha256 => DocumentId {
                value: URL_SAFE_NO_PAD.encode(Sha256::digest(content)),
                degraded: false,
            },
            DigestAlgorithm::Unavailable(_) => {
                let [k0, k1, k2, k3] = DEGRADED_SEEDS;
                let hash = ahash::RandomState::with_seeds(k0, k1, k2, k3).hash_one(content);
                DocumentId {
                    value: URL_SAFE_NO_PAD.encode(hash.to_be_bytes()),
                    degraded: true,
                }
            }
        }
    }
}

impl Default for DocumentIdBuilder {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(DigestAlgorithm::from_name("SHA-1"), DigestAlgorithm::Sha1);
        assert_eq!(DigestAlgorithm::from_name("sha"), DigestAlgorithm::Sha1);
        assert_eq!(DigestAlgorithm::from_name(" sha_256 "), DigestAlgorithm::Sha256);
        assert_eq!(
            DigestAlgorithm::from_name("MD2"),
            DigestAlgorithm::Unavailable("MD2".to_string())
        );
    }

    #[test]
    fn test_sha1_id_is_url_safe() {
        let id = DocumentIdBuilder::new(DigestAlgorithm::Sha1).document_id(b"{\"a\":\"b\"}");

        assert!(!id.degraded);
        // 20 bytes -> 27 base64 characters without padding
        assert_eq!(id.value.len(), 27);
        assert!(id
            .value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_known_sha1_value() {
        // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        let id = DocumentIdBuilder::new(DigestAlgorithm::Sha1).document_id(b"abc");
        assert_eq!(id.value, "qZk-NkcGgWq6PiVxeFDCbJzQ2J0");
    }

    #[test]
    fn test_sha256_id_length() {
        let id = DocumentIdBuilder::new(DigestAlgorithm::Sha256).document_id(b"abc");
        assert!(!id.degraded);
        assert_eq!(id.value.len(), 43);
    }

    #[test]
    fn test_same_content_same_id() {
        let builder = DocumentIdBuilder::default();
        assert_eq!(builder.document_id(b"same"), builder.document_id(b"same"));
        assert_ne!(builder.document_id(b"same"), builder.document_id(b"other"));
    }

    #[test]
    fn test_degraded_mode_is_flagged_and_stable() {
        let builder = DocumentIdBuilder::new(DigestAlgorithm::from_name("nope"));
        let a = builder.document_id(b"content");
        let b = builder.document_id(b"content");

        assert!(a.degraded);
        assert_eq!(a, b);
        assert_eq!(a.value.len(), 11);
        assert_ne!(a, builder.document_id(b"different"));
    }
}
